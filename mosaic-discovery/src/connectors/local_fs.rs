//! Local media directory connector
//!
//! Walks the configured root with symlinks followed. Every directory is
//! resolved to its canonical path and entered at most once, so symlink
//! cycles and diamond-shaped links terminate and never duplicate assets.

use super::{Connector, FetchOutcome, RawRecord};
use crate::config::LocalFsConfig;
use crate::error::ConnectorError;
use crate::model::{Source, IMAGE_EXTENSIONS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// One media file found under the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    /// Absolute path as walked (may pass through symlinks)
    pub path: PathBuf,
    /// `/`-separated path relative to the root; the source-local key
    pub relative_path: String,
    /// Directory names from the root down to the file's directory
    pub folder_chain: Vec<String>,
    /// Lowercase, no dot
    pub extension: String,
    pub modified_at: Option<DateTime<Utc>>,
    /// Image next to a video named `<stem>_thumbnail.<ext>` or `<stem>.<ext>`
    pub sidecar_thumbnail: Option<PathBuf>,
}

/// Files found plus the per-entry problems that were skipped
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub records: Vec<LocalRecord>,
    pub errors: Vec<String>,
}

/// Local filesystem connector
#[derive(Debug, Clone)]
pub struct LocalFsConnector {
    config: LocalFsConfig,
}

impl LocalFsConnector {
    pub fn new(config: LocalFsConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Walk the root synchronously
    ///
    /// Fails only when the root itself is missing or not a directory;
    /// unreadable entries below it are logged and skipped.
    pub fn scan(&self) -> Result<ScanResult, ConnectorError> {
        let root = &self.config.root;
        if !root.exists() {
            return Err(ConnectorError::SourceUnavailable {
                origin: Source::Local,
                reason: format!("path not found: {}", root.display()),
            });
        }
        if !root.is_dir() {
            return Err(ConnectorError::SourceUnavailable {
                origin: Source::Local,
                reason: format!("not a directory: {}", root.display()),
            });
        }

        let mut visited_dirs = HashSet::new();
        let mut visited_files = HashSet::new();
        let mut result = ScanResult::default();

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut visited_dirs));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    result.errors.push(e.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let extension = match entry.path().extension() {
                Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
                None => continue,
            };
            if !self.config.extensions.contains(&extension) {
                continue;
            }

            // Same file reached through two links
            if let Ok(canonical) = entry.path().canonicalize() {
                if !visited_files.insert(canonical) {
                    tracing::debug!("Skipping duplicate file: {}", entry.path().display());
                    continue;
                }
            }

            match self.build_record(&entry, extension) {
                Some(record) => result.records.push(record),
                None => {
                    let msg = format!("Cannot relativize {}", entry.path().display());
                    tracing::warn!("{}", msg);
                    result.errors.push(msg);
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = result.records.len(),
            errors = result.errors.len(),
            "Local scan complete"
        );

        Ok(result)
    }

    fn should_process_entry(&self, entry: &DirEntry, visited_dirs: &mut HashSet<PathBuf>) -> bool {
        if entry.depth() > 0 {
            let file_name = entry.file_name().to_string_lossy();
            if file_name.starts_with('.') {
                return false;
            }
            if self.config.ignore_patterns.iter().any(|p| file_name.contains(p.as_str())) {
                return false;
            }
        }

        if entry.file_type().is_dir() {
            match entry.path().canonicalize() {
                Ok(canonical) => {
                    if !visited_dirs.insert(canonical) {
                        tracing::warn!("Directory already visited (symlink): {}", entry.path().display());
                        return false;
                    }
                }
                Err(e) => {
                    tracing::warn!("Cannot resolve {}: {}", entry.path().display(), e);
                    return false;
                }
            }
        }

        true
    }

    fn build_record(&self, entry: &DirEntry, extension: String) -> Option<LocalRecord> {
        let relative = entry.path().strip_prefix(&self.config.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let (_, folder_chain) = parts.split_last()?;

        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        let sidecar_thumbnail = if crate::model::VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            find_video_thumbnail(entry.path())
        } else {
            None
        };

        Some(LocalRecord {
            path: entry.path().to_path_buf(),
            relative_path: parts.join("/"),
            folder_chain: folder_chain.to_vec(),
            extension,
            modified_at,
            sidecar_thumbnail,
        })
    }
}

/// Look for `<stem>_thumbnail.<img>` then `<stem>.<img>` beside a video
pub fn find_video_thumbnail(video: &Path) -> Option<PathBuf> {
    let stem = video.file_stem()?.to_string_lossy().into_owned();
    let dir = video.parent()?;
    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        [format!("{}_thumbnail.{}", stem, ext), format!("{}.{}", stem, ext)]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}

#[async_trait]
impl Connector for LocalFsConnector {
    fn source(&self) -> Source {
        Source::Local
    }

    async fn fetch(&self) -> FetchOutcome {
        let scanner = self.clone();
        match tokio::task::spawn_blocking(move || scanner.scan()).await {
            Ok(Ok(scan)) => {
                let records = scan.records.into_iter().map(RawRecord::Local).collect();
                if scan.errors.is_empty() {
                    return FetchOutcome::fresh(Source::Local, records);
                }
                let root = &self.config.root;
                tracing::warn!(
                    root = %root.display(),
                    unreadable = scan.errors.len(),
                    "Local scan skipped unreadable entries"
                );
                FetchOutcome::partial(
                    Source::Local,
                    records,
                    ConnectorError::Io {
                        path: root.clone(),
                        reason: format!("{} entries could not be read", scan.errors.len()),
                    },
                )
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Local scan failed");
                FetchOutcome::failed(Source::Local, e)
            }
            Err(join_err) => FetchOutcome::failed(
                Source::Local,
                ConnectorError::SourceUnavailable {
                    origin: Source::Local,
                    reason: format!("scan task failed: {}", join_err),
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn scan(root: &Path) -> ScanResult {
        LocalFsConnector::new(LocalFsConfig::new(root)).scan().unwrap()
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let connector = LocalFsConnector::new(LocalFsConfig::new("/nonexistent/mosaic/path"));
        assert!(matches!(
            connector.scan(),
            Err(ConnectorError::SourceUnavailable { origin: Source::Local, .. })
        ));
    }

    #[test]
    fn test_scan_file_as_root() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jpg");
        touch(&file);
        assert!(LocalFsConnector::new(LocalFsConfig::new(&file)).scan().is_err());
    }

    #[test]
    fn test_extension_filter_and_folder_chain() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("trips/2023/beach.JPG"));
        touch(&dir.path().join("trips/notes.txt"));
        touch(&dir.path().join("clip.mp4"));

        let result = scan(dir.path());
        let mut keys: Vec<_> = result.records.iter().map(|r| r.relative_path.clone()).collect();
        keys.sort();
        assert_eq!(keys, vec!["clip.mp4", "trips/2023/beach.JPG"]);

        let beach = result.records.iter().find(|r| r.extension == "jpg").unwrap();
        assert_eq!(beach.folder_chain, vec!["trips", "2023"]);
        assert!(beach.modified_at.is_some());
    }

    #[test]
    fn test_hidden_and_ignored_entries_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(".cache/a.png"));
        touch(&dir.path().join("node_modules/b.png"));
        touch(&dir.path().join(".hidden.png"));
        touch(&dir.path().join("visible.png"));

        let result = scan(dir.path());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].relative_path, "visible.png");
    }

    #[test]
    fn test_video_sidecar_thumbnail() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("clip.mp4"));
        touch(&dir.path().join("clip_thumbnail.jpg"));
        touch(&dir.path().join("other.mov"));

        let result = scan(dir.path());
        let clip = result.records.iter().find(|r| r.relative_path == "clip.mp4").unwrap();
        assert_eq!(
            clip.sidecar_thumbnail.as_deref(),
            Some(dir.path().join("clip_thumbnail.jpg").as_path())
        );
        let other = result.records.iter().find(|r| r.relative_path == "other.mov").unwrap();
        assert!(other.sidecar_thumbnail.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/img.jpg"));
        std::os::unix::fs::symlink(dir.path(), dir.path().join("a/loop")).unwrap();

        let result = scan(dir.path());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].relative_path, "a/img.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn test_diamond_symlink_yields_file_once() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/img.jpg"));
        std::os::unix::fs::symlink(dir.path().join("a"), dir.path().join("b")).unwrap();

        let result = scan(dir.path());
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].relative_path, "a/img.jpg");
    }

    #[tokio::test]
    async fn test_fetch_wraps_records() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("x.gif"));
        let outcome = LocalFsConnector::new(LocalFsConfig::new(dir.path())).fetch().await;
        assert!(outcome.succeeded());
        assert!(matches!(outcome.records[0], RawRecord::Local(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entries_reported_with_records() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("ok.png"));
        std::os::unix::fs::symlink(dir.path().join("gone.png"), dir.path().join("dangling.png")).unwrap();

        let outcome = LocalFsConnector::new(LocalFsConfig::new(dir.path())).fetch().await;
        assert_eq!(outcome.records.len(), 1);
        assert!(!outcome.stale);
        assert!(matches!(outcome.error, Some(ConnectorError::Io { ref reason, .. }) if reason.starts_with("1 ")));
        assert!(!outcome.succeeded());
        assert!(outcome.delivered());
    }
}
