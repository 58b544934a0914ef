//! RowIO - rowing pose pipeline
//!
//! Entry point: argument parsing, logging and settings.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rowio_session::PipelineSettings;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rowio", version, about = "Pose overlays for rowing videos")]
struct Cli {
    /// JSON settings file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty session for a video
    Create {
        title: String,
        video: PathBuf,
        /// Replace an existing session with the same title
        #[arg(long)]
        overwrite: bool,
    },
    /// Create a session if needed and run every stage
    Run {
        title: String,
        video: PathBuf,
        /// Pose detector command line, e.g. "python3 detect.py"
        #[arg(long)]
        detector: String,
        /// Re-run stages whose output already exists
        #[arg(long)]
        overwrite: bool,
        /// Cancel the run if it is still going after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Print a session's state and artifacts
    Show { title: String },
    /// Delete a session directory
    Delete { title: String },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    info!(sessions_root = %settings.sessions_root.display(), "RowIO starting");

    match cli.command {
        Command::Create {
            title,
            video,
            overwrite,
        } => commands::create(settings, &title, &video, overwrite),
        Command::Run {
            title,
            video,
            detector,
            overwrite,
            timeout,
        } => commands::run(
            settings,
            &title,
            &video,
            &detector,
            overwrite,
            timeout.map(Duration::from_secs),
        ),
        Command::Show { title } => commands::show(settings, &title),
        Command::Delete { title } => commands::delete(settings, &title),
    }
}

fn load_settings(path: Option<&std::path::Path>) -> Result<PipelineSettings> {
    let mut settings = match path {
        Some(path) => PipelineSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => PipelineSettings::default(),
    };
    settings
        .apply_env()
        .context("applying environment overrides")?;
    settings.validate().context("invalid settings")?;
    debug!(?settings, "settings loaded");
    Ok(settings)
}
