//! Configuration loading and resolution
//!
//! Bootstrap configuration is read once at startup, resolved in priority order:
//! 1. Explicit path / overrides from the command line (highest priority)
//! 2. Environment variables (`MOSAIC_CONFIG`, `MOSAIC_MEDIA_ROOT`, ...)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing TOML file is not an error: the resolver logs a warning and
//! continues with defaults. A TOML file that exists but fails to parse is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const ENV_CONFIG_PATH: &str = "MOSAIC_CONFIG";
/// Environment variable overriding `sources.media_root`
pub const ENV_MEDIA_ROOT: &str = "MOSAIC_MEDIA_ROOT";
/// Environment variable overriding `sources.asset_manager_url`
pub const ENV_ASSET_MANAGER_URL: &str = "MOSAIC_ASSET_MANAGER_URL";
/// Environment variable overriding `sources.asset_manager_library`
pub const ENV_ASSET_MANAGER_LIBRARY: &str = "MOSAIC_ASSET_MANAGER_LIBRARY";
/// Environment variable overriding `sources.bookmarks_path`
pub const ENV_BOOKMARKS: &str = "MOSAIC_BOOKMARKS";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; absent values are filled from compiled defaults
/// when the engine builds its typed configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub discovery: DiscoveryToml,

    #[serde(default)]
    pub asset_manager: AssetManagerToml,

    /// Bookmark focus modes (`[[focus_modes]]` tables)
    #[serde(default)]
    pub focus_modes: Vec<FocusModeToml>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Source locations
///
/// A source with no location configured is disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Root directory of the local media library
    pub media_root: Option<PathBuf>,
    /// Allowed file extensions (lowercase, without dot)
    pub media_extensions: Option<Vec<String>>,
    /// Entry names skipped while walking the media root
    pub ignore_patterns: Option<Vec<String>>,
    /// Base URL of the asset-manager HTTP API
    pub asset_manager_url: Option<String>,
    /// Library directory of the asset manager (for resolving files and thumbnails)
    pub asset_manager_library: Option<PathBuf>,
    /// Browser bookmark file
    pub bookmarks_path: Option<PathBuf>,
}

/// Discovery tuning knobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryToml {
    pub refresh_ttl_secs: Option<u64>,
    pub cluster_threshold: Option<f64>,
    pub max_clusters: Option<usize>,
    pub trending_window_secs: Option<u64>,
    pub connector_timeout_secs: Option<u64>,
    pub feed_seed: Option<u64>,
    #[serde(default)]
    pub feed_slots: FeedSlotsToml,
}

/// Per-section slot sizes of the discovery feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSlotsToml {
    pub hero: Option<usize>,
    pub featured: Option<usize>,
    pub newly_added: Option<usize>,
    pub trending: Option<usize>,
    pub random_inspiration: Option<usize>,
    pub video_highlights: Option<usize>,
    pub folder_spotlights: Option<usize>,
    pub popular_tags: Option<usize>,
    pub similar_clusters: Option<usize>,
    pub cluster_members: Option<usize>,
}

/// Asset-manager client settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetManagerToml {
    pub page_size: Option<usize>,
    pub max_pages: Option<usize>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

/// One bookmark focus mode as written in TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocusModeToml {
    pub id: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub folders: Vec<String>,
    #[serde(default)]
    pub include_urls: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_urls: Vec<String>,
}

/// Platform-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    /// Default TOML location (`<config_dir>/mosaic/config.toml`)
    pub config_path: Option<PathBuf>,
    /// Chrome's default bookmark file for this platform
    pub bookmarks_path: Option<PathBuf>,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            config_path: dirs::config_dir().map(|d| d.join("mosaic").join("config.toml")),
            bookmarks_path: default_bookmarks_path(),
            log_level: default_log_level(),
        }
    }
}

fn default_bookmarks_path() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir().map(|d| {
            d.join("Google")
                .join("Chrome")
                .join("User Data")
                .join("Default")
                .join("Bookmarks")
        })
    } else if cfg!(target_os = "macos") {
        dirs::home_dir().map(|d| {
            d.join("Library")
                .join("Application Support")
                .join("Google")
                .join("Chrome")
                .join("Default")
                .join("Bookmarks")
        })
    } else {
        dirs::config_dir().map(|d| d.join("google-chrome").join("Default").join("Bookmarks"))
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolves the bootstrap configuration from CLI, environment, file and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_config_path: Option<PathBuf>,
    overrides: SourcesConfig,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config file given on the command line (takes priority over `MOSAIC_CONFIG`)
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config_path = path;
        self
    }

    /// Source locations given on the command line
    pub fn with_source_overrides(mut self, overrides: SourcesConfig) -> Self {
        self.overrides = overrides;
        self
    }

    /// Resolve the effective configuration
    ///
    /// Fails only when an explicitly requested config file is missing or
    /// when a config file exists but cannot be parsed.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match self.config_file()? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            None => {
                warn!("No configuration file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        apply_env_overrides(&mut config.sources);
        apply_overrides(&mut config.sources, &self.overrides);

        // The browser default counts only when the browser has actually written it
        if config.sources.bookmarks_path.is_none() {
            config.sources.bookmarks_path = CompiledDefaults::for_current_platform()
                .bookmarks_path
                .filter(|path| path.is_file());
        }

        Ok(config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>> {
        // Priority 1: command-line argument
        if let Some(path) = &self.cli_config_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(
                "{} points to missing file {}, ignoring",
                ENV_CONFIG_PATH,
                path.display()
            );
        }

        // Priority 3: platform config directory
        Ok(CompiledDefaults::for_current_platform()
            .config_path
            .filter(|p| p.exists()))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn apply_env_overrides(sources: &mut SourcesConfig) {
    if let Some(v) = non_empty_env(ENV_MEDIA_ROOT) {
        sources.media_root = Some(PathBuf::from(v));
    }
    if let Some(v) = non_empty_env(ENV_ASSET_MANAGER_URL) {
        sources.asset_manager_url = Some(v);
    }
    if let Some(v) = non_empty_env(ENV_ASSET_MANAGER_LIBRARY) {
        sources.asset_manager_library = Some(PathBuf::from(v));
    }
    if let Some(v) = non_empty_env(ENV_BOOKMARKS) {
        sources.bookmarks_path = Some(PathBuf::from(v));
    }
}

fn apply_overrides(sources: &mut SourcesConfig, overrides: &SourcesConfig) {
    if overrides.media_root.is_some() {
        sources.media_root = overrides.media_root.clone();
    }
    if overrides.asset_manager_url.is_some() {
        sources.asset_manager_url = overrides.asset_manager_url.clone();
    }
    if overrides.asset_manager_library.is_some() {
        sources.asset_manager_library = overrides.asset_manager_library.clone();
    }
    if overrides.bookmarks_path.is_some() {
        sources.bookmarks_path = overrides.bookmarks_path.clone();
    }
}
