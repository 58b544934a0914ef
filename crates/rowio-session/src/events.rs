//! Per-session event streams.
//!
//! A late subscriber first sees the last event published under its key,
//! then everything after it. Idle streams yield keep-alives.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::state::SessionState;

/// Capacity of each subscriber's queue. Events beyond it are dropped.
pub const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { stage: String, percent: f64 },
    StateChanged { state: SessionState },
    Finished {
        state: SessionState,
        message: Option<String>,
    },
}

/// What a stream yields on each poll.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(PipelineEvent),
    KeepAlive,
    /// The key was closed; no more events will arrive.
    Closed,
}

#[derive(Default)]
struct Channel {
    last: Option<PipelineEvent>,
    subscribers: Vec<(u64, Sender<PipelineEvent>)>,
}

#[derive(Default)]
struct HubState {
    channels: HashMap<String, Channel>,
    next_id: u64,
}

/// Fan-out of pipeline events keyed by session title.
#[derive(Clone, Default)]
pub struct EventHub {
    state: Arc<Mutex<HubState>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` as the latest for `key` and offer it to every
    /// subscriber without blocking.
    pub fn publish(&self, key: &str, event: PipelineEvent) {
        let mut state = self.state.lock();
        let channel = state.channels.entry(key.to_string()).or_default();
        channel.subscribers.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(key, subscriber = id, "subscriber queue full; event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        channel.last = Some(event);
    }

    /// Attach to `key`. The last event, if any, is delivered first.
    pub fn subscribe(&self, key: &str) -> EventStream {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        let channel = state.channels.entry(key.to_string()).or_default();
        if let Some(last) = &channel.last {
            let _ = tx.try_send(last.clone());
        }
        channel.subscribers.push((id, tx));

        EventStream {
            key: key.to_string(),
            id,
            rx,
            hub: Arc::clone(&self.state),
        }
    }

    /// Disconnect every subscriber of `key` and forget its last event.
    pub fn close(&self, key: &str) {
        self.state.lock().channels.remove(key);
    }

    pub fn last_event(&self, key: &str) -> Option<PipelineEvent> {
        self.state
            .lock()
            .channels
            .get(key)
            .and_then(|c| c.last.clone())
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .channels
            .get(key)
            .map_or(0, |c| c.subscribers.len())
    }
}

/// One subscriber's view of a key. Detaches on drop.
pub struct EventStream {
    key: String,
    id: u64,
    rx: Receiver<PipelineEvent>,
    hub: Arc<Mutex<HubState>>,
}

impl EventStream {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait up to `keepalive` for the next event.
    pub fn next_timeout(&self, keepalive: Duration) -> StreamItem {
        match self.rx.recv_timeout(keepalive) {
            Ok(event) => StreamItem::Event(event),
            Err(RecvTimeoutError::Timeout) => StreamItem::KeepAlive,
            Err(RecvTimeoutError::Disconnected) => StreamItem::Closed,
        }
    }

    /// Next event if one is already queued.
    pub fn try_next(&self) -> Option<PipelineEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        let mut state = self.hub.lock();
        let Some(channel) = state.channels.get_mut(&self.key) else {
            return;
        };
        channel.subscribers.retain(|(id, _)| *id != self.id);
        if channel.subscribers.is_empty() {
            state.channels.remove(&self.key);
        }
    }
}
