//! Discovery engine
//!
//! Owns the connectors, the canonical store and the interaction log.
//! A refresh fetches from every connector concurrently, then normalizes,
//! indexes and clusters in one single-writer phase and offers the result
//! to the store. All read operations work on the published snapshot and
//! never wait for a refresh.

use crate::cluster::jaccard;
use crate::config::DiscoveryConfig;
use crate::connectors::{ConnectorSet, FetchOutcome};
use crate::error::ConnectorError;
use crate::feed::{build_feed, Feed};
use crate::focus::FocusMode;
use crate::index::FolderTree;
use crate::model::{Asset, AssetId, Source, TagEntry};
use crate::normalize::normalize_all;
use crate::store::{CanonicalStore, PublishOutcome, SnapshotParts, SourceStatus, StoreSnapshot};
use crate::trending::{recency_order, InteractionLog, TrendingWindow};
use chrono::{DateTime, Utc};
use mosaic_common::events::{DiscoveryEvent, EventBus};
use mosaic_common::{time, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub generation: u64,
    pub outcome: PublishOutcome,
    pub asset_count: usize,
    pub malformed_count: usize,
    pub sources: Vec<SourceStatus>,
}

impl RefreshReport {
    pub fn published(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Published { .. })
    }
}

pub struct DiscoveryEngine {
    config: Arc<DiscoveryConfig>,
    connectors: ConnectorSet,
    store: CanonicalStore,
    interactions: InteractionLog,
    events: EventBus,
}

impl DiscoveryEngine {
    /// Engine with one connector per configured source
    pub fn new(config: DiscoveryConfig) -> std::result::Result<Self, ConnectorError> {
        let connectors = ConnectorSet::from_config(&config)?;
        Ok(Self::with_connectors(config, connectors))
    }

    pub fn with_connectors(config: DiscoveryConfig, connectors: ConnectorSet) -> Self {
        let interactions = InteractionLog::new(config.trending_window);
        Self {
            config: Arc::new(config),
            connectors,
            store: CanonicalStore::new(),
            interactions,
            events: EventBus::default(),
        }
    }

    /// Share an outer event bus instead of the private one
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run one refresh generation to completion
    ///
    /// Never fails: connector errors end up in the source status and
    /// malformed records are skipped. A generation overtaken by a newer
    /// one is built but not published.
    pub async fn refresh(&self) -> RefreshReport {
        let generation = self.store.begin_generation();
        info!(generation, connectors = self.connectors.count(), "Refresh started");
        self.events.emit_lossy(DiscoveryEvent::RefreshStarted {
            generation,
            timestamp: time::now(),
        });

        let outcomes = self.connectors.fetch_all().await;
        for outcome in &outcomes {
            self.events.emit_lossy(DiscoveryEvent::SourceFetched {
                generation,
                source: outcome.source.to_string(),
                record_count: outcome.records.len(),
                stale: outcome.stale,
                error: outcome.error.as_ref().map(ToString::to_string),
                timestamp: time::now(),
            });
        }

        let snapshot = self.build_snapshot(generation, &outcomes, time::now());
        let asset_count = snapshot.len();
        let malformed_count = snapshot.malformed.len();
        let sources: Vec<SourceStatus> = snapshot.sources.values().cloned().collect();

        let outcome = self.store.publish(snapshot);
        match outcome {
            PublishOutcome::Published { version } => {
                info!(generation = version, asset_count, malformed_count, "Refresh published");
                self.events.emit_lossy(DiscoveryEvent::RefreshPublished {
                    generation: version,
                    asset_count,
                    malformed_count,
                    timestamp: time::now(),
                });
            }
            PublishOutcome::Superseded { version, latest } => {
                info!(generation = version, superseded_by = latest, "Refresh superseded, discarded");
                self.events.emit_lossy(DiscoveryEvent::RefreshSuperseded {
                    generation: version,
                    superseded_by: latest,
                    timestamp: time::now(),
                });
            }
            PublishOutcome::Outdated { version, current } => {
                info!(generation = version, current, "Refresh outdated, discarded");
                self.events.emit_lossy(DiscoveryEvent::RefreshSuperseded {
                    generation: version,
                    superseded_by: current,
                    timestamp: time::now(),
                });
            }
        }

        RefreshReport {
            generation,
            outcome,
            asset_count,
            malformed_count,
            sources,
        }
    }

    /// Refresh only when nothing is published yet or the snapshot is older
    /// than the configured TTL
    pub async fn refresh_if_stale(&self, now: DateTime<Utc>) -> Option<RefreshReport> {
        let current = self.store.current();
        let ttl = chrono::Duration::from_std(self.config.refresh_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        if current.version > 0 && now - current.built_at < ttl {
            debug!(generation = current.version, "Snapshot fresh, skipping refresh");
            return None;
        }
        Some(self.refresh().await)
    }

    /// Single-writer phase: normalize, index, cluster
    fn build_snapshot(
        &self,
        generation: u64,
        outcomes: &[FetchOutcome],
        now: DateTime<Utc>,
    ) -> StoreSnapshot {
        let previous = self.store.current();
        let ingested_at =
            |id: &AssetId| previous.first_seen.get(id).copied().unwrap_or(now);

        let (assets, malformed) =
            normalize_all(outcomes.iter().flat_map(|o| o.records.iter()), &ingested_at);
        for record in &malformed {
            warn!(error = %record, "Malformed record skipped");
        }

        let first_seen: BTreeMap<AssetId, DateTime<Utc>> = assets
            .iter()
            .map(|a| (a.id.clone(), ingested_at(&a.id)))
            .collect();

        let mut counts: BTreeMap<Source, usize> = BTreeMap::new();
        for asset in &assets {
            *counts.entry(asset.source).or_default() += 1;
        }

        let enabled = self.connectors.sources();
        let sources = Source::ALL
            .iter()
            .map(|&source| {
                let status = match outcomes.iter().find(|o| o.source == source) {
                    Some(outcome) => {
                        let available = outcome.delivered();
                        SourceStatus {
                            source,
                            enabled: enabled.contains(&source),
                            available,
                            stale: outcome.stale,
                            asset_count: counts.get(&source).copied().unwrap_or(0),
                            last_error: outcome.error.as_ref().map(ToString::to_string),
                            last_success: if available {
                                Some(now)
                            } else {
                                previous.sources.get(&source).and_then(|s| s.last_success)
                            },
                        }
                    }
                    None => SourceStatus::disabled(source),
                };
                (source, status)
            })
            .collect();

        StoreSnapshot::build(SnapshotParts {
            version: generation,
            built_at: now,
            assets,
            first_seen,
            sources,
            malformed,
            cluster_threshold: self.config.cluster_threshold,
            max_clusters: self.config.max_clusters,
        })
    }

    /// The published snapshot
    pub fn current(&self) -> Arc<StoreSnapshot> {
        self.store.current()
    }

    pub fn feed(&self) -> Feed {
        self.feed_at(time::now())
    }

    /// Feed with trending evaluated at `now`
    pub fn feed_at(&self, now: DateTime<Utc>) -> Feed {
        let snapshot = self.store.current();
        let window = self.config.trending_window;
        let views = self.interactions.counts(now, window);
        let trending = TrendingWindow::build(&snapshot, &views, now, window);
        build_feed(&snapshot, &snapshot.tags, &trending, &snapshot.clusters, &self.config.feed)
    }

    pub fn get_asset(&self, id: &AssetId) -> Option<Asset> {
        self.store.current().get(id).cloned()
    }

    /// Assets directly inside a folder of one source
    pub fn list_by_folder(&self, source: Source, path: &[String]) -> Vec<Asset> {
        let snapshot = self.store.current();
        snapshot
            .folders
            .assets_in(source, path)
            .iter()
            .filter_map(|id| snapshot.get(id).cloned())
            .collect()
    }

    /// Assets carrying `tag`, in ascending id order
    pub fn list_by_tag(&self, tag: &str) -> Vec<Asset> {
        let snapshot = self.store.current();
        snapshot
            .tags
            .get(tag)
            .iter()
            .filter_map(|id| snapshot.get(id).cloned())
            .collect()
    }

    /// Every tag in popularity order
    /// Assets most like `id`, best first
    ///
    /// Anything sharing a tag is ranked by Jaccard similarity, then
    /// recency. Remaining room is filled with siblings from the same folder
    /// of the same source, newest first.
    pub fn similar_to(&self, id: &AssetId, limit: usize) -> Result<Vec<Asset>> {
        let snapshot = self.store.current();
        let item = snapshot
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("asset '{}'", id)))?;

        let candidates: BTreeSet<&AssetId> = item
            .tags
            .iter()
            .flat_map(|tag| snapshot.tags.get(tag).iter())
            .filter(|other| *other != id)
            .collect();
        let mut scored: Vec<(f64, &Asset)> = candidates
            .into_iter()
            .filter_map(|other| snapshot.get(other))
            .map(|other| (jaccard(&item.tags, &other.tags), other))
            .collect();
        scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| recency_order(a, b)));

        let mut picked: Vec<&Asset> = scored.into_iter().map(|(_, a)| a).take(limit).collect();
        if picked.len() < limit {
            let mut siblings: Vec<&Asset> = snapshot
                .folders
                .assets_in(item.source, &item.folder_path)
                .iter()
                .filter(|other| *other != id && !picked.iter().any(|p| &p.id == *other))
                .filter_map(|other| snapshot.get(other))
                .collect();
            siblings.sort_by(|a, b| recency_order(a, b));
            let room = limit - picked.len();
            picked.extend(siblings.into_iter().take(room));
        }

        debug!(asset = %id, found = picked.len(), "Similar items");
        Ok(picked.into_iter().cloned().collect())
    }

    pub fn list_tags(&self) -> Vec<TagEntry> {
        self.store.current().tags.popular()
    }

    pub fn list_folders(&self, source: Source) -> Option<FolderTree> {
        self.store.current().folders.tree(source).cloned()
    }

    /// Case-insensitive substring match over title and tags, newest first
    pub fn search(&self, keyword: &str, limit: usize) -> Vec<Asset> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let snapshot = self.store.current();
        let mut hits: Vec<&Asset> = snapshot
            .assets
            .values()
            .filter(|a| {
                a.title.to_lowercase().contains(&needle)
                    || a.tags.iter().any(|t| t.contains(&needle))
            })
            .collect();
        hits.sort_by(|a, b| recency_order(a, b));
        hits.into_iter().take(limit).cloned().collect()
    }

    /// Count one view towards trending
    pub fn record_view(&self, id: &AssetId, at: DateTime<Utc>) -> Result<()> {
        if self.store.current().get(id).is_none() {
            return Err(Error::NotFound(format!("asset {}", id)));
        }
        self.interactions.record(id.clone(), at);
        Ok(())
    }

    pub fn focus_modes(&self) -> &[FocusMode] {
        &self.config.focus_modes
    }

    /// Bookmarks matching a focus mode, by folder path then title
    pub fn list_bookmarks_in_focus(&self, mode_id: &str) -> Result<Vec<Asset>> {
        let wanted = mode_id.trim().to_lowercase();
        if wanted.is_empty() {
            return Err(Error::InvalidInput("focus mode id is empty".to_string()));
        }
        let mode = self
            .config
            .focus_modes
            .iter()
            .find(|m| m.id == wanted)
            .ok_or_else(|| Error::NotFound(format!("focus mode '{}'", mode_id)))?;

        let snapshot = self.store.current();
        let mut hits: Vec<&Asset> = snapshot
            .assets
            .values()
            .filter(|a| a.source == Source::Bookmark && mode.matches_asset(a))
            .collect();
        hits.sort_by(|a, b| {
            a.folder_path
                .cmp(&b.folder_path)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(hits.into_iter().cloned().collect())
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.store.current().sources.values().cloned().collect()
    }
}
