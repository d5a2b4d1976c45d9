//! Discovery feed builder
//!
//! [`build_feed`] is a pure function of an already built snapshot, its
//! indices and a trending window. It performs no I/O and cannot fail:
//! a section without data is simply empty.

use crate::config::FeedConfig;
use crate::index::TagIndex;
use crate::model::{Asset, AssetId, AssetKind, AssetSummary, Cluster, FolderKey, Source};
use crate::store::StoreSnapshot;
use crate::trending::{recency_order, TrendingWindow};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Homepage contract consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feed {
    /// Store generation the feed was built from
    pub generation: u64,
    pub generated_at: DateTime<Utc>,
    pub hero: Vec<AssetSummary>,
    pub featured: Vec<AssetSummary>,
    pub newly_added: Vec<AssetSummary>,
    pub trending: Vec<AssetSummary>,
    pub random_inspiration: Vec<AssetSummary>,
    pub video_highlights: Vec<AssetSummary>,
    pub folder_spotlights: Vec<AssetSummary>,
    pub popular_tags: Vec<PopularTag>,
    pub similar_clusters: Vec<ClusterSummary>,
    pub sources: BTreeMap<Source, FeedSource>,
}

impl Feed {
    /// Asset sections keyed by their stable names
    pub fn asset_sections(&self) -> BTreeMap<&'static str, &[AssetSummary]> {
        BTreeMap::from([
            ("hero", self.hero.as_slice()),
            ("featured", self.featured.as_slice()),
            ("newly_added", self.newly_added.as_slice()),
            ("trending", self.trending.as_slice()),
            ("random_inspiration", self.random_inspiration.as_slice()),
            ("video_highlights", self.video_highlights.as_slice()),
            ("folder_spotlights", self.folder_spotlights.as_slice()),
        ])
    }

    pub fn is_stale(&self, source: Source) -> bool {
        self.sources.get(&source).map(|s| s.stale).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularTag {
    pub tag: String,
    pub asset_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSummary {
    pub seed: AssetSummary,
    pub size: usize,
    pub members: Vec<AssetSummary>,
}

/// Per-source flags shown next to the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedSource {
    pub enabled: bool,
    pub available: bool,
    pub stale: bool,
    pub asset_count: usize,
}

pub fn build_feed(
    snapshot: &StoreSnapshot,
    tags: &TagIndex,
    trending: &TrendingWindow,
    clusters: &[Cluster],
    config: &FeedConfig,
) -> Feed {
    let slots = &config.slots;

    let mut by_recency: Vec<&Asset> = snapshot.assets.values().collect();
    by_recency.sort_by(|a, b| recency_order(a, b));

    let mut spotlight = by_recency.iter().filter(|a| a.thumbnail_ref.is_some());
    let hero: Vec<AssetSummary> = spotlight.by_ref().take(slots.hero).map(|a| a.summary()).collect();
    let featured: Vec<AssetSummary> = spotlight.take(slots.featured).map(|a| a.summary()).collect();

    let newly_added = trending
        .newly_added(snapshot, slots.newly_added)
        .into_iter()
        .map(Asset::summary)
        .collect();

    let trending_section = trending
        .trending(snapshot, slots.trending)
        .into_iter()
        .map(|(a, _)| a.summary())
        .collect();

    let video_highlights = by_recency
        .iter()
        .filter(|a| a.kind.is_video())
        .take(slots.video_highlights)
        .map(|a| a.summary())
        .collect();

    Feed {
        generation: snapshot.version,
        generated_at: trending.now,
        hero,
        featured,
        newly_added,
        trending: trending_section,
        random_inspiration: random_inspiration(snapshot, slots.random_inspiration, config.seed),
        video_highlights,
        folder_spotlights: folder_spotlights(snapshot, slots.folder_spotlights),
        popular_tags: tags
            .popular()
            .into_iter()
            .take(slots.popular_tags)
            .map(|e| PopularTag {
                tag: e.tag,
                asset_count: e.asset_count,
            })
            .collect(),
        similar_clusters: similar_clusters(snapshot, clusters, slots.similar_clusters, slots.cluster_members),
        sources: snapshot
            .sources
            .iter()
            .map(|(source, status)| {
                (
                    *source,
                    FeedSource {
                        enabled: status.enabled,
                        available: status.available,
                        stale: status.stale,
                        asset_count: status.asset_count,
                    },
                )
            })
            .collect(),
    }
}

/// Seeded sample over images in id order
fn random_inspiration(snapshot: &StoreSnapshot, n: usize, seed: u64) -> Vec<AssetSummary> {
    let images: Vec<&Asset> = snapshot
        .assets
        .values()
        .filter(|a| a.kind == AssetKind::Image)
        .collect();
    let mut rng = StdRng::seed_from_u64(seed);
    images
        .choose_multiple(&mut rng, n)
        .map(|a| a.summary())
        .collect()
}

/// Largest folders, each shown with its newest asset as cover
fn folder_spotlights(snapshot: &StoreSnapshot, n: usize) -> Vec<AssetSummary> {
    snapshot
        .folders
        .by_size()
        .into_iter()
        .take(n)
        .map(|(key, node)| {
            let cover = node
                .asset_ids
                .iter()
                .filter_map(|id| snapshot.get(id))
                .min_by(|a, b| recency_order(a, b));
            folder_link(&key, cover)
        })
        .collect()
}

fn folder_link(key: &FolderKey, cover: Option<&Asset>) -> AssetSummary {
    AssetSummary {
        id: AssetId::derive(key.source, &format!("folder:{}", key.path.join("/"))).to_string(),
        title: key.path.last().cloned().unwrap_or_default(),
        thumbnail_ref: cover.and_then(|a| a.summary().thumbnail_ref),
        kind: AssetKind::FolderLink,
        open_target: key.display(),
    }
}

/// Clusters with at least two members, size descending then seed ascending
fn similar_clusters(
    snapshot: &StoreSnapshot,
    clusters: &[Cluster],
    n: usize,
    members_per_cluster: usize,
) -> Vec<ClusterSummary> {
    let mut multi: Vec<&Cluster> = clusters.iter().filter(|c| c.members.len() >= 2).collect();
    multi.sort_by(|a, b| {
        b.members
            .len()
            .cmp(&a.members.len())
            .then_with(|| a.seed.cmp(&b.seed))
    });

    multi
        .into_iter()
        .filter_map(|c| {
            let seed = snapshot.get(&c.seed)?.summary();
            let mut seen = HashSet::new();
            let members = c
                .members
                .iter()
                .filter(|id| seen.insert(*id))
                .filter_map(|id| snapshot.get(id))
                .take(members_per_cluster)
                .map(Asset::summary)
                .collect();
            Some(ClusterSummary {
                seed,
                size: c.members.len(),
                members,
            })
        })
        .take(n)
        .collect()
}
