//! # Mosaic Discovery
//!
//! Aggregates media and link metadata from a local media folder, an
//! asset-manager HTTP API and a browser bookmark file into one canonical
//! store, indexes it by tag and folder, groups similar assets and composes
//! a discovery feed from it.
//!
//! The [`engine::DiscoveryEngine`] is the entry point: call
//! [`refresh`](engine::DiscoveryEngine::refresh) to pull from every source,
//! then read the feed or query the published snapshot.

pub mod cluster;
pub mod config;
pub mod connectors;
pub mod engine;
pub mod error;
pub mod feed;
pub mod focus;
pub mod index;
pub mod model;
pub mod normalize;
pub mod retry;
pub mod store;
pub mod trending;

pub use config::DiscoveryConfig;
pub use engine::{DiscoveryEngine, RefreshReport};
pub use error::{ConnectorError, MalformedRecord};
pub use feed::Feed;
pub use model::{Asset, AssetId, AssetKind, Source};
