//! Canonical asset model
//!
//! Every source's raw records end up as an [`Asset`]. Assets are plain values:
//! once normalized they are never mutated, only replaced by the next refresh
//! generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Image extensions recognised across sources (lowercase, no dot)
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
/// Video extensions recognised across sources (lowercase, no dot)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Where an asset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Local,
    AssetManager,
    Bookmark,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Local, Source::AssetManager, Source::Bookmark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Local => "local",
            Source::AssetManager => "asset-manager",
            Source::Bookmark => "bookmark",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of thing an asset is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Image,
    Video,
    /// A link to a folder (used by folder spotlights)
    FolderLink,
    Bookmark,
    YoutubeVideo,
}

impl AssetKind {
    /// Classify a media file by extension
    pub fn from_extension(ext: &str) -> Option<AssetKind> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(AssetKind::Video)
        } else {
            None
        }
    }

    /// Video-like kinds shown in video highlights
    pub fn is_video(&self) -> bool {
        matches!(self, AssetKind::Video | AssetKind::YoutubeVideo)
    }
}

/// Stable asset identifier: SHA-256 of `source|source-local key`, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn derive(source: Source, local_key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(local_key.as_bytes());
        AssetId(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        AssetId(value.to_string())
    }
}

/// How to open an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Locator {
    /// Filesystem path
    Path(PathBuf),
    /// Web URL
    Url(String),
    /// Item reference understood by the asset-manager API
    ApiRef(String),
}

impl Locator {
    /// Path/URL/API reference rendered for the presentation layer
    pub fn open_target(&self) -> String {
        match self {
            Locator::Path(path) => path.to_string_lossy().into_owned(),
            Locator::Url(url) => url.clone(),
            Locator::ApiRef(item_id) => format!("asset-manager:{}", item_id),
        }
    }
}

/// Resolved thumbnail location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ThumbnailRef {
    File(PathBuf),
    Url(String),
}

impl ThumbnailRef {
    pub fn render(&self) -> String {
        match self {
            ThumbnailRef::File(path) => path.to_string_lossy().into_owned(),
            ThumbnailRef::Url(url) => url.clone(),
        }
    }
}

/// A single browsable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub source: Source,
    pub kind: AssetKind,
    pub title: String,
    /// Lowercase, trimmed, deduplicated
    pub tags: BTreeSet<String>,
    /// Folder names from the source root down to the asset's folder
    pub folder_path: Vec<String>,
    pub locator: Locator,
    pub thumbnail_ref: Option<ThumbnailRef>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            id: self.id.to_string(),
            title: self.title.clone(),
            thumbnail_ref: self.thumbnail_ref.as_ref().map(ThumbnailRef::render),
            kind: self.kind,
            open_target: self.locator.open_target(),
        }
    }
}

/// What the presentation layer renders for one feed slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: String,
    pub title: String,
    pub thumbnail_ref: Option<String>,
    pub kind: AssetKind,
    pub open_target: String,
}

/// Folder identity, scoped per source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FolderKey {
    pub source: Source,
    pub path: Vec<String>,
}

impl FolderKey {
    pub fn new(source: Source, path: Vec<String>) -> Self {
        Self { source, path }
    }

    /// `source:/a/b` form used as the open target of folder links
    pub fn display(&self) -> String {
        format!("{}:/{}", self.source, self.path.join("/"))
    }
}

/// Tag with the assets carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub tag: String,
    pub asset_count: usize,
    /// Ascending id order
    pub asset_ids: Vec<AssetId>,
}

/// Assets grouped by shared tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub seed: AssetId,
    /// Ascending id order, seed included
    pub members: Vec<AssetId>,
    /// Similarity threshold that produced the grouping
    pub threshold: f64,
}

/// Normalize one tag: trim, strip leading `#`, lowercase
pub fn normalize_tag(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_start_matches('#').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_lowercase())
    }
}

/// Normalize and deduplicate a tag list case-insensitively
pub fn normalize_tags<I, S>(raw: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|t| normalize_tag(t.as_ref()))
        .collect()
}
