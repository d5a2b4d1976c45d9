//! Refresh event types and the EventBus
//!
//! Refresh cycles announce their progress here so that an outer layer
//! (a server-sent-events endpoint, a CLI progress line) can follow along
//! without polling the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Mosaic event types
///
/// Events are broadcast via [`EventBus`] and serialize with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryEvent {
    /// A refresh generation began fetching from its connectors
    RefreshStarted {
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// One connector finished (successfully, stale, or failed)
    SourceFetched {
        generation: u64,
        /// Source name (`local`, `asset-manager`, `bookmark`)
        source: String,
        /// Raw records returned by the connector
        record_count: usize,
        /// Records came from the previous successful fetch
        stale: bool,
        /// Connector error, if any
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A generation was published and is now visible to readers
    RefreshPublished {
        generation: u64,
        asset_count: usize,
        /// Records skipped during normalization
        malformed_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A generation finished but a newer one was already requested or published
    RefreshSuperseded {
        generation: u64,
        superseded_by: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for [`DiscoveryEvent`]s
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DiscoveryEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DiscoveryEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
