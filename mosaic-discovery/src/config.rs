//! Typed discovery configuration
//!
//! Built once at startup from the bootstrap [`TomlConfig`] and shared
//! read-only (behind an `Arc`) by the engine and every connector.

use crate::focus::{sanitize_modes, FocusMode};
use crate::model::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use mosaic_common::config::TomlConfig;
use mosaic_common::{Error, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REFRESH_TTL_SECS: u64 = 300;
const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.34;
const DEFAULT_MAX_CLUSTERS: usize = 200;
const DEFAULT_TRENDING_WINDOW_SECS: u64 = 7 * 24 * 3600;
const MAX_TRENDING_WINDOW_SECS: u64 = 3650 * 24 * 3600;
const DEFAULT_CONNECTOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FEED_SEED: u64 = 0x5eed;
const MAX_SLOT_SIZE: usize = 500;

/// Fully resolved configuration of the discovery engine
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Snapshot age after which `refresh_if_stale` rebuilds
    pub refresh_ttl: Duration,
    /// Jaccard threshold θ; members must score strictly above it
    pub cluster_threshold: f64,
    pub max_clusters: usize,
    pub trending_window: chrono::Duration,
    pub connector_timeout: Duration,
    pub feed: FeedConfig,
    pub local: Option<LocalFsConfig>,
    pub asset_manager: Option<AssetManagerConfig>,
    pub bookmarks: Option<BookmarksConfig>,
    /// Sanitized; always contains the `all` mode
    pub focus_modes: Vec<FocusMode>,
}

/// Feed section sizes and sampling seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub slots: FeedSlots,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSlots {
    pub hero: usize,
    pub featured: usize,
    pub newly_added: usize,
    pub trending: usize,
    pub random_inspiration: usize,
    pub video_highlights: usize,
    pub folder_spotlights: usize,
    pub popular_tags: usize,
    pub similar_clusters: usize,
    /// Members shown per similar cluster
    pub cluster_members: usize,
}

impl Default for FeedSlots {
    fn default() -> Self {
        Self {
            hero: 1,
            featured: 4,
            newly_added: 12,
            trending: 12,
            random_inspiration: 8,
            video_highlights: 4,
            folder_spotlights: 6,
            popular_tags: 20,
            similar_clusters: 3,
            cluster_members: 6,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            slots: FeedSlots::default(),
            seed: DEFAULT_FEED_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFsConfig {
    pub root: PathBuf,
    /// Lowercase extensions without dot
    pub extensions: BTreeSet<String>,
    pub ignore_patterns: Vec<String>,
}

impl LocalFsConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: IMAGE_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS.iter())
                .map(|e| e.to_string())
                .collect(),
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                "node_modules".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManagerConfig {
    pub base_url: String,
    /// Library directory used to resolve item files and thumbnails
    pub library_path: Option<PathBuf>,
    pub page_size: usize,
    /// Upper bound on pages per listing
    pub max_pages: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl AssetManagerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            library_path: None,
            page_size: 200,
            max_pages: 500,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarksConfig {
    pub path: PathBuf,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            trending_window: chrono::Duration::seconds(DEFAULT_TRENDING_WINDOW_SECS as i64),
            connector_timeout: Duration::from_secs(DEFAULT_CONNECTOR_TIMEOUT_SECS),
            feed: FeedConfig::default(),
            local: None,
            asset_manager: None,
            bookmarks: None,
            focus_modes: sanitize_modes(&[]),
        }
    }
}

impl DiscoveryConfig {
    /// Build and validate the typed configuration
    pub fn from_toml(toml: &TomlConfig) -> Result<Self> {
        let d = &toml.discovery;
        let defaults = FeedSlots::default();
        let s = &d.feed_slots;

        let window_secs = d.trending_window_secs.unwrap_or(DEFAULT_TRENDING_WINDOW_SECS);
        if window_secs > MAX_TRENDING_WINDOW_SECS {
            return Err(Error::Config(format!(
                "trending_window_secs must be <= {}, got {}",
                MAX_TRENDING_WINDOW_SECS, window_secs
            )));
        }

        let config = Self {
            refresh_ttl: Duration::from_secs(d.refresh_ttl_secs.unwrap_or(DEFAULT_REFRESH_TTL_SECS)),
            cluster_threshold: d.cluster_threshold.unwrap_or(DEFAULT_CLUSTER_THRESHOLD),
            max_clusters: d.max_clusters.unwrap_or(DEFAULT_MAX_CLUSTERS),
            trending_window: chrono::Duration::seconds(window_secs as i64),
            connector_timeout: Duration::from_secs(
                d.connector_timeout_secs.unwrap_or(DEFAULT_CONNECTOR_TIMEOUT_SECS),
            ),
            feed: FeedConfig {
                slots: FeedSlots {
                    hero: s.hero.unwrap_or(defaults.hero),
                    featured: s.featured.unwrap_or(defaults.featured),
                    newly_added: s.newly_added.unwrap_or(defaults.newly_added),
                    trending: s.trending.unwrap_or(defaults.trending),
                    random_inspiration: s.random_inspiration.unwrap_or(defaults.random_inspiration),
                    video_highlights: s.video_highlights.unwrap_or(defaults.video_highlights),
                    folder_spotlights: s.folder_spotlights.unwrap_or(defaults.folder_spotlights),
                    popular_tags: s.popular_tags.unwrap_or(defaults.popular_tags),
                    similar_clusters: s.similar_clusters.unwrap_or(defaults.similar_clusters),
                    cluster_members: s.cluster_members.unwrap_or(defaults.cluster_members),
                },
                seed: d.feed_seed.unwrap_or(DEFAULT_FEED_SEED),
            },
            local: toml.sources.media_root.as_ref().map(|root| {
                let mut local = LocalFsConfig::new(root.clone());
                if let Some(exts) = &toml.sources.media_extensions {
                    local.extensions = exts
                        .iter()
                        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect();
                }
                if let Some(patterns) = &toml.sources.ignore_patterns {
                    local.ignore_patterns = patterns.clone();
                }
                local
            }),
            asset_manager: toml.sources.asset_manager_url.as_ref().map(|url| {
                let am = &toml.asset_manager;
                let mut config = AssetManagerConfig::new(url.clone());
                config.library_path = toml.sources.asset_manager_library.clone();
                if let Some(v) = am.page_size {
                    config.page_size = v;
                }
                if let Some(v) = am.max_pages {
                    config.max_pages = v;
                }
                if let Some(v) = am.max_retries {
                    config.retry.max_retries = v;
                }
                if let Some(v) = am.initial_backoff_ms {
                    config.retry.initial_backoff = Duration::from_millis(v);
                }
                if let Some(v) = am.max_backoff_ms {
                    config.retry.max_backoff = Duration::from_millis(v);
                }
                if let Some(v) = am.request_timeout_secs {
                    config.request_timeout = Duration::from_secs(v);
                }
                config
            }),
            bookmarks: toml
                .sources
                .bookmarks_path
                .as_ref()
                .map(|path| BookmarksConfig { path: path.clone() }),
            focus_modes: sanitize_modes(&toml.focus_modes),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cluster_threshold) || self.cluster_threshold.is_nan() {
            return Err(Error::Config(format!(
                "cluster_threshold must be within [0, 1], got {}",
                self.cluster_threshold
            )));
        }
        if self.trending_window <= chrono::Duration::zero() {
            return Err(Error::Config("trending_window_secs must be > 0".to_string()));
        }
        if self.trending_window > chrono::Duration::seconds(MAX_TRENDING_WINDOW_SECS as i64) {
            return Err(Error::Config(format!(
                "trending_window_secs must be <= {}",
                MAX_TRENDING_WINDOW_SECS
            )));
        }
        if self.connector_timeout.is_zero() {
            return Err(Error::Config("connector_timeout_secs must be > 0".to_string()));
        }
        if self.refresh_ttl.is_zero() {
            return Err(Error::Config("refresh_ttl_secs must be > 0".to_string()));
        }
        let s = &self.feed.slots;
        let largest = [
            s.hero,
            s.featured,
            s.newly_added,
            s.trending,
            s.random_inspiration,
            s.video_highlights,
            s.folder_spotlights,
            s.popular_tags,
            s.similar_clusters,
            s.cluster_members,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if largest > MAX_SLOT_SIZE {
            return Err(Error::Config(format!(
                "feed slot sizes must be <= {}, got {}",
                MAX_SLOT_SIZE, largest
            )));
        }
        if let Some(local) = &self.local {
            if local.extensions.is_empty() {
                return Err(Error::Config("media_extensions must not be empty".to_string()));
            }
        }
        if let Some(am) = &self.asset_manager {
            if am.page_size == 0 || am.max_pages == 0 {
                return Err(Error::Config(
                    "asset_manager page_size and max_pages must be > 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// At least one source has a location configured
    pub fn has_any_source(&self) -> bool {
        self.local.is_some() || self.asset_manager.is_some() || self.bookmarks.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_common::config::{SourcesConfig, TomlConfig};

    #[test]
    fn test_defaults_without_sources() {
        let config = DiscoveryConfig::from_toml(&TomlConfig::default()).unwrap();
        assert!(!config.has_any_source());
        assert_eq!(config.cluster_threshold, DEFAULT_CLUSTER_THRESHOLD);
        assert_eq!(config.feed.slots, FeedSlots::default());
        assert!(config.focus_modes.iter().any(|m| m.id == "all"));
    }

    #[test]
    fn test_sources_enable_connectors() {
        let toml = TomlConfig {
            sources: SourcesConfig {
                media_root: Some(PathBuf::from("/media")),
                media_extensions: Some(vec![".JPG".into(), "mp4".into()]),
                asset_manager_url: Some("http://localhost:41595/".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = DiscoveryConfig::from_toml(&toml).unwrap();
        let local = config.local.unwrap();
        assert!(local.extensions.contains("jpg"));
        assert_eq!(local.extensions.len(), 2);
        assert_eq!(config.asset_manager.unwrap().base_url, "http://localhost:41595");
        assert!(config.bookmarks.is_none());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut toml = TomlConfig::default();
        toml.discovery.cluster_threshold = Some(1.5);
        assert!(matches!(DiscoveryConfig::from_toml(&toml), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut toml = TomlConfig::default();
        toml.discovery.trending_window_secs = Some(0);
        assert!(DiscoveryConfig::from_toml(&toml).is_err());
    }

    #[test]
    fn test_huge_window_rejected() {
        let mut toml = TomlConfig::default();
        toml.discovery.trending_window_secs = Some(u64::MAX);
        assert!(matches!(DiscoveryConfig::from_toml(&toml), Err(Error::Config(_))));

        toml.discovery.trending_window_secs = Some(MAX_TRENDING_WINDOW_SECS);
        assert!(DiscoveryConfig::from_toml(&toml).is_ok());

        let config = DiscoveryConfig {
            trending_window: chrono::Duration::days(365 * 1000),
            ..DiscoveryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_slot_rejected() {
        let mut toml = TomlConfig::default();
        toml.discovery.feed_slots.popular_tags = Some(10_000);
        assert!(DiscoveryConfig::from_toml(&toml).is_err());
    }
}
