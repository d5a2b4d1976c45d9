//! Bookmark focus modes
//!
//! A focus mode is a named, case-insensitive filter over bookmark titles,
//! folder paths and URLs. Excludes always win. A mode without any positive
//! filter accepts everything that is not excluded; otherwise a bookmark must
//! match at least one positive filter.

use crate::model::{Asset, AssetKind, Locator};
use mosaic_common::config::FocusModeToml;
use serde::Serialize;
use std::collections::HashSet;

pub const ALL_MODE_ID: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusMode {
    /// Lowercase, unique
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub folders: Vec<String>,
    pub include_urls: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub exclude_urls: Vec<String>,
}

impl FocusMode {
    /// The implicit mode accepting every bookmark
    pub fn all() -> Self {
        Self {
            id: ALL_MODE_ID.to_string(),
            label: "All bookmarks".to_string(),
            description: Some("Every bookmark in the browser".to_string()),
            keywords: Vec::new(),
            folders: Vec::new(),
            include_urls: Vec::new(),
            exclude_keywords: Vec::new(),
            exclude_urls: Vec::new(),
        }
    }

    pub fn matches(&self, title: &str, url: &str, folder_path: &[String]) -> bool {
        let url = url.to_lowercase();
        let path_blob = folder_path
            .iter()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_lowercase())
            .collect::<Vec<_>>()
            .join(" / ");
        let text_blob = format!("{} {}", title.to_lowercase(), path_blob);

        if self.exclude_urls.iter().any(|t| url.contains(t.as_str())) {
            return false;
        }
        if self.exclude_keywords.iter().any(|t| text_blob.contains(t.as_str())) {
            return false;
        }

        let mut positive = Vec::with_capacity(3);
        if !self.keywords.is_empty() {
            positive.push(self.keywords.iter().any(|t| text_blob.contains(t.as_str())));
        }
        if !self.folders.is_empty() {
            positive.push(self.folders.iter().any(|t| path_blob.contains(t.as_str())));
        }
        if !self.include_urls.is_empty() {
            positive.push(self.include_urls.iter().any(|t| url.contains(t.as_str())));
        }

        positive.is_empty() || positive.into_iter().any(|hit| hit)
    }

    /// Only bookmark-kind assets can match
    pub fn matches_asset(&self, asset: &Asset) -> bool {
        if !matches!(asset.kind, AssetKind::Bookmark | AssetKind::YoutubeVideo) {
            return false;
        }
        let url = match &asset.locator {
            Locator::Url(url) => url.as_str(),
            _ => "",
        };
        self.matches(&asset.title, url, &asset.folder_path)
    }
}

fn clean_terms(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Normalize configured modes: lowercase ids, drop blanks and duplicates,
/// and make sure `all` exists (first when it was not configured)
pub fn sanitize_modes(raw: &[FocusModeToml]) -> Vec<FocusMode> {
    let mut seen = HashSet::new();
    let mut modes = Vec::new();

    for entry in raw {
        let id = entry.id.trim().to_lowercase();
        if id.is_empty() || !seen.insert(id.clone()) {
            continue;
        }
        modes.push(FocusMode {
            label: entry
                .label
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| entry.id.trim().to_string()),
            description: entry.description.clone(),
            keywords: clean_terms(&entry.keywords),
            folders: clean_terms(&entry.folders),
            include_urls: clean_terms(&entry.include_urls),
            exclude_keywords: clean_terms(&entry.exclude_keywords),
            exclude_urls: clean_terms(&entry.exclude_urls),
            id,
        });
    }

    if !seen.contains(ALL_MODE_ID) {
        modes.insert(0, FocusMode::all());
    }
    modes
}
