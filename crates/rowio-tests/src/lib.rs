//! Integration test crate for RowIO.
//!
//! This crate exists solely to hold cross-crate integration tests. Videos
//! are written with the raw codec and poses come from scripted detectors,
//! so no FFmpeg install or pose model is needed.

#[cfg(test)]
mod support;

#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod resampling;

#[cfg(test)]
mod lifecycle;

#[cfg(test)]
mod pipeline;
