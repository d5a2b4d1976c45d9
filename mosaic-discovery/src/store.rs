//! Versioned canonical store
//!
//! A [`StoreSnapshot`] is built once by a single writer and never mutated
//! afterwards. The [`CanonicalStore`] hands out `Arc`s to the published
//! snapshot and swaps in a newer one atomically. A generation that is no
//! longer the latest requested is discarded instead of published.

use crate::cluster::cluster_assets;
use crate::error::MalformedRecord;
use crate::index::{FolderIndex, TagIndex};
use crate::model::{Asset, AssetId, Cluster, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Health of one source as of a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub source: Source,
    /// A location for this source is configured
    pub enabled: bool,
    /// The last fetch delivered fresh records
    pub available: bool,
    /// Assets come from an earlier successful fetch
    pub stale: bool,
    pub asset_count: usize,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

impl SourceStatus {
    pub fn disabled(source: Source) -> Self {
        Self {
            source,
            enabled: false,
            available: false,
            stale: false,
            asset_count: 0,
            last_error: None,
            last_success: None,
        }
    }
}

/// Everything one refresh generation produced
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub assets: BTreeMap<AssetId, Asset>,
    /// Fallback date handed to normalization, carried across generations
    pub first_seen: BTreeMap<AssetId, DateTime<Utc>>,
    pub tags: TagIndex,
    pub folders: FolderIndex,
    pub clusters: Vec<Cluster>,
    pub sources: BTreeMap<Source, SourceStatus>,
    pub malformed: Vec<MalformedRecord>,
}

/// Inputs for one snapshot
pub struct SnapshotParts {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub assets: Vec<Asset>,
    pub first_seen: BTreeMap<AssetId, DateTime<Utc>>,
    pub sources: BTreeMap<Source, SourceStatus>,
    pub malformed: Vec<MalformedRecord>,
    pub cluster_threshold: f64,
    pub max_clusters: usize,
}

impl StoreSnapshot {
    /// Generation 0: nothing fetched yet
    pub fn empty() -> Self {
        Self {
            version: 0,
            built_at: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            assets: BTreeMap::new(),
            first_seen: BTreeMap::new(),
            tags: TagIndex::default(),
            folders: FolderIndex::default(),
            clusters: Vec::new(),
            sources: Source::ALL
                .iter()
                .map(|s| (*s, SourceStatus::disabled(*s)))
                .collect(),
            malformed: Vec::new(),
        }
    }

    /// Build the asset map and every derived structure
    pub fn build(parts: SnapshotParts) -> Self {
        let assets: BTreeMap<AssetId, Asset> = parts
            .assets
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        let tags = TagIndex::build(assets.values());
        let folders = FolderIndex::build(&assets);
        let clusters = cluster_assets(&assets, &tags, parts.cluster_threshold, parts.max_clusters);

        Self {
            version: parts.version,
            built_at: parts.built_at,
            first_seen: parts
                .first_seen
                .into_iter()
                .filter(|(id, _)| assets.contains_key(id))
                .collect(),
            assets,
            tags,
            folders,
            clusters,
            sources: parts.sources,
            malformed: parts.malformed,
        }
    }

    pub fn get(&self, id: &AssetId) -> Option<&Asset> {
        self.assets.get(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Sources whose assets are served from cache
    pub fn stale_sources(&self) -> Vec<Source> {
        self.sources
            .values()
            .filter(|s| s.stale)
            .map(|s| s.source)
            .collect()
    }
}

/// Result of offering a snapshot for publication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { version: u64 },
    /// A newer generation was requested while this one was being built
    Superseded { version: u64, latest: u64 },
    /// An equal or newer generation is already visible
    Outdated { version: u64, current: u64 },
}

/// Holder of the currently published snapshot
pub struct CanonicalStore {
    published: RwLock<Arc<StoreSnapshot>>,
    next_version: AtomicU64,
    latest_requested: AtomicU64,
}

impl CanonicalStore {
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Arc::new(StoreSnapshot::empty())),
            next_version: AtomicU64::new(0),
            latest_requested: AtomicU64::new(0),
        }
    }

    /// Reserve the next generation number and mark it as the latest request
    pub fn begin_generation(&self) -> u64 {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest_requested.fetch_max(version, Ordering::SeqCst);
        version
    }

    pub fn latest_requested(&self) -> u64 {
        self.latest_requested.load(Ordering::SeqCst)
    }

    /// Atomically replace the visible snapshot, unless it is out of date
    pub fn publish(&self, snapshot: StoreSnapshot) -> PublishOutcome {
        let version = snapshot.version;
        let latest = self.latest_requested();
        if version < latest {
            return PublishOutcome::Superseded { version, latest };
        }

        let mut guard = match self.published.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if version <= guard.version {
            return PublishOutcome::Outdated {
                version,
                current: guard.version,
            };
        }
        *guard = Arc::new(snapshot);
        PublishOutcome::Published { version }
    }

    /// The visible snapshot; its contents never change
    pub fn current(&self) -> Arc<StoreSnapshot> {
        match self.published.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl Default for CanonicalStore {
    fn default() -> Self {
        Self::new()
    }
}
