//! Raw record to canonical [`Asset`] mapping
//!
//! One explicit function per source. Every function is pure: the same
//! record and ingestion time always give the same asset (or the same
//! rejection).

use crate::connectors::bookmarks::extract_youtube_id;
use crate::connectors::{BookmarkRecord, LocalRecord, ManagerItem, RawRecord};
use crate::error::MalformedRecord;
use crate::model::{
    normalize_tag, normalize_tags, Asset, AssetId, AssetKind, Locator, Source, ThumbnailRef,
};
use chrono::{DateTime, Utc};
use mosaic_common::time::{from_unix_millis, from_webkit_micros};
use reqwest::Url;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Normalize one record; `ingested_at` stands in for a missing source date
pub fn normalize(record: &RawRecord, ingested_at: DateTime<Utc>) -> Result<Asset, MalformedRecord> {
    match record {
        RawRecord::Local(r) => normalize_local(r, ingested_at),
        RawRecord::AssetManager(r) => normalize_manager_item(r, ingested_at),
        RawRecord::Bookmark(r) => normalize_bookmark(r, ingested_at),
    }
}

/// Normalize a batch, skipping and reporting failures
///
/// `ingested_at` gives the fallback date per asset id, so an undated asset
/// keeps the time it was first seen across refreshes. A second record
/// mapping to an already used id is rejected; the first one wins.
pub fn normalize_all<'a, I, F>(records: I, ingested_at: F) -> (Vec<Asset>, Vec<MalformedRecord>)
where
    I: IntoIterator<Item = &'a RawRecord>,
    F: Fn(&AssetId) -> DateTime<Utc>,
{
    let mut assets = Vec::new();
    let mut malformed = Vec::new();
    let mut seen = HashSet::new();

    for record in records {
        let id = record.asset_id();
        if seen.contains(&id) {
            malformed.push(MalformedRecord {
                origin: record.source(),
                key: record.local_key(),
                reason: format!("duplicate id {}", id),
            });
            continue;
        }
        match normalize(record, ingested_at(&id)) {
            Ok(asset) => {
                seen.insert(id);
                assets.push(asset);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed record");
                malformed.push(e);
            }
        }
    }

    (assets, malformed)
}

fn malformed(origin: Source, key: &str, reason: impl Into<String>) -> MalformedRecord {
    MalformedRecord {
        origin,
        key: if key.is_empty() { "<empty>".to_string() } else { key.to_string() },
        reason: reason.into(),
    }
}

/// `#name` folder components become tags
fn tag_folder_tags<'a>(folders: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    folders
        .into_iter()
        .filter(|name| name.starts_with('#'))
        .filter_map(|name| normalize_tag(name))
        .collect()
}

fn normalize_local(r: &LocalRecord, ingested_at: DateTime<Utc>) -> Result<Asset, MalformedRecord> {
    let key = r.relative_path.as_str();
    if key.is_empty() {
        return Err(malformed(Source::Local, key, "empty relative path"));
    }
    let kind = AssetKind::from_extension(&r.extension)
        .ok_or_else(|| malformed(Source::Local, key, format!("unsupported extension '{}'", r.extension)))?;

    let file_name = key.rsplit('/').next().unwrap_or(key);
    let title = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| file_name.to_string());

    let thumbnail_ref = match kind {
        AssetKind::Image => Some(ThumbnailRef::File(r.path.clone())),
        _ => r.sidecar_thumbnail.clone().map(ThumbnailRef::File),
    };

    Ok(Asset {
        id: AssetId::derive(Source::Local, key),
        source: Source::Local,
        kind,
        title,
        tags: tag_folder_tags(&r.folder_chain),
        folder_path: r.folder_chain.clone(),
        locator: Locator::Path(r.path.clone()),
        thumbnail_ref,
        created_at: r.modified_at.unwrap_or(ingested_at),
    })
}

fn normalize_manager_item(r: &ManagerItem, ingested_at: DateTime<Utc>) -> Result<Asset, MalformedRecord> {
    let key = r.id.trim();
    if key.is_empty() {
        return Err(malformed(Source::AssetManager, &r.name, "missing item id"));
    }
    let kind = AssetKind::from_extension(&r.ext).ok_or_else(|| {
        malformed(Source::AssetManager, key, format!("unsupported extension '{}'", r.ext))
    })?;

    let title = if r.name.trim().is_empty() {
        key.to_string()
    } else {
        r.name.clone()
    };

    let mut tags = normalize_tags(&r.tags);
    tags.extend(tag_folder_tags(r.folder_paths.iter().flatten()));

    let (locator, thumbnail_ref) = match &r.library_path {
        Some(library) => {
            let dir = library.join("images").join(format!("{}.info", key));
            let file = dir.join(format!("{}.{}", r.name, r.ext));
            let thumbnail = if kind == AssetKind::Video {
                dir.join(format!("{}_thumbnail.png", r.name))
            } else {
                file.clone()
            };
            (Locator::Path(file), Some(ThumbnailRef::File(thumbnail)))
        }
        None => (Locator::ApiRef(key.to_string()), None),
    };

    Ok(Asset {
        id: AssetId::derive(Source::AssetManager, key),
        source: Source::AssetManager,
        kind,
        title,
        tags,
        folder_path: r.folder_paths.first().cloned().unwrap_or_default(),
        locator,
        thumbnail_ref,
        created_at: r
            .created_at_ms
            .filter(|ms| *ms > 0)
            .and_then(from_unix_millis)
            .unwrap_or(ingested_at),
    })
}

fn normalize_bookmark(r: &BookmarkRecord, ingested_at: DateTime<Utc>) -> Result<Asset, MalformedRecord> {
    let key = r.local_key();
    let url = r.url.trim();
    if url.is_empty() {
        return Err(malformed(Source::Bookmark, &key, "empty url"));
    }
    if let Err(e) = Url::parse(url) {
        return Err(malformed(Source::Bookmark, &key, format!("invalid url: {}", e)));
    }

    let (kind, thumbnail_ref) = match extract_youtube_id(url) {
        Some(video_id) => (
            AssetKind::YoutubeVideo,
            Some(ThumbnailRef::Url(format!(
                "https://img.youtube.com/vi/{}/hqdefault.jpg",
                video_id
            ))),
        ),
        None => (AssetKind::Bookmark, None),
    };

    Ok(Asset {
        id: AssetId::derive(Source::Bookmark, &key),
        source: Source::Bookmark,
        kind,
        title: if r.title.trim().is_empty() { url.to_string() } else { r.title.clone() },
        tags: BTreeSet::new(),
        folder_path: r.folder_path.clone(),
        locator: Locator::Url(url.to_string()),
        thumbnail_ref,
        created_at: r.date_added.and_then(from_webkit_micros).unwrap_or(ingested_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn ingest() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn local(rel: &str, ext: &str) -> LocalRecord {
        let parts: Vec<String> = rel.split('/').map(str::to_string).collect();
        LocalRecord {
            path: PathBuf::from("/media").join(rel),
            relative_path: rel.to_string(),
            folder_chain: parts[..parts.len() - 1].to_vec(),
            extension: ext.to_string(),
            modified_at: None,
            sidecar_thumbnail: None,
        }
    }

    fn item(id: &str, ext: &str) -> ManagerItem {
        ManagerItem {
            id: id.to_string(),
            name: "sunset".to_string(),
            ext: ext.to_string(),
            tags: vec!["Sky".into(), "sky".into(), "Orange".into()],
            folder_paths: vec![vec!["Photos".into(), "#Travel".into()]],
            created_at_ms: Some(1_700_000_000_000),
            library_path: None,
        }
    }

    fn bookmark(url: &str) -> BookmarkRecord {
        BookmarkRecord {
            node_id: Some("7".into()),
            title: "Video".into(),
            url: url.into(),
            folder_path: vec!["Bookmarks bar".into()],
            date_added: None,
        }
    }

    #[test]
    fn test_local_tag_folders_and_fallback_date() {
        let asset = normalize_local(&local("#Cats/#Cute/kitten.jpg", "jpg"), ingest()).unwrap();
        assert_eq!(asset.kind, AssetKind::Image);
        assert_eq!(asset.title, "kitten");
        assert_eq!(asset.folder_path, vec!["#Cats", "#Cute"]);
        assert_eq!(asset.tags.iter().cloned().collect::<Vec<_>>(), vec!["cats", "cute"]);
        assert_eq!(asset.created_at, ingest());
        assert_eq!(asset.thumbnail_ref, Some(ThumbnailRef::File(PathBuf::from("/media/#Cats/#Cute/kitten.jpg"))));
    }

    #[test]
    fn test_local_id_depends_only_on_relative_path() {
        let a = normalize_local(&local("a/b.png", "png"), ingest()).unwrap();
        let mut moved_root = local("a/b.png", "png");
        moved_root.path = PathBuf::from("/elsewhere/a/b.png");
        let b = normalize_local(&moved_root, ingest()).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_local_unsupported_extension_rejected() {
        let err = normalize_local(&local("notes.txt", "txt"), ingest()).unwrap_err();
        assert_eq!(err.origin, Source::Local);
        assert_eq!(err.key, "notes.txt");
    }

    #[test]
    fn test_manager_item_tags_merge_with_tag_folders() {
        let asset = normalize_manager_item(&item("K1", "png"), ingest()).unwrap();
        let tags: Vec<_> = asset.tags.iter().cloned().collect();
        assert_eq!(tags, vec!["orange", "sky", "travel"]);
        assert_eq!(asset.locator, Locator::ApiRef("K1".into()));
        assert!(asset.thumbnail_ref.is_none());
        assert_eq!(asset.created_at, from_unix_millis(1_700_000_000_000).unwrap());
    }

    #[test]
    fn test_manager_video_thumbnail_in_library() {
        let mut r = item("K2", "mp4");
        r.library_path = Some(PathBuf::from("/lib"));
        let asset = normalize_manager_item(&r, ingest()).unwrap();
        assert_eq!(asset.kind, AssetKind::Video);
        assert_eq!(asset.locator, Locator::Path(PathBuf::from("/lib/images/K2.info/sunset.mp4")));
        assert_eq!(
            asset.thumbnail_ref,
            Some(ThumbnailRef::File(PathBuf::from("/lib/images/K2.info/sunset_thumbnail.png")))
        );
    }

    #[test]
    fn test_manager_missing_id_rejected() {
        assert!(normalize_manager_item(&item("  ", "png"), ingest()).is_err());
    }

    #[test]
    fn test_bookmark_youtube_kind_and_thumbnail() {
        let asset = normalize_bookmark(&bookmark("https://www.youtube.com/watch?v=abc123"), ingest()).unwrap();
        assert_eq!(asset.kind, AssetKind::YoutubeVideo);
        assert_eq!(
            asset.thumbnail_ref,
            Some(ThumbnailRef::Url("https://img.youtube.com/vi/abc123/hqdefault.jpg".into()))
        );

        let generic = normalize_bookmark(&bookmark("https://example.com/abc"), ingest()).unwrap();
        assert_eq!(generic.kind, AssetKind::Bookmark);
        assert!(generic.thumbnail_ref.is_none());
    }

    #[test]
    fn test_bookmark_webkit_date() {
        let mut r = bookmark("https://example.com");
        // 2021-01-01T00:00:00Z
        r.date_added = Some((1_609_459_200 + 11_644_473_600) * 1_000_000);
        let asset = normalize_bookmark(&r, ingest()).unwrap();
        assert_eq!(asset.created_at, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_bookmark_invalid_url_rejected() {
        assert!(normalize_bookmark(&bookmark("not a url"), ingest()).is_err());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let record = RawRecord::AssetManager(item("K9", "gif"));
        assert_eq!(normalize(&record, ingest()), normalize(&record, ingest()));
    }

    #[test]
    fn test_normalize_all_skips_bad_and_duplicate_records() {
        let records = vec![
            RawRecord::Local(local("a.png", "png")),
            RawRecord::Local(local("a.png", "png")),
            RawRecord::Local(local("b.doc", "doc")),
            RawRecord::Bookmark(bookmark("https://example.com")),
        ];
        let (assets, malformed) = normalize_all(&records, |_| ingest());
        assert_eq!(assets.len(), 2);
        assert_eq!(malformed.len(), 2);
    }
}
