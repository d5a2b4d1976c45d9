//! Local media folder and bookmark file, wired through the configured engine

use mosaic_discovery::config::{BookmarksConfig, DiscoveryConfig, LocalFsConfig};
use mosaic_discovery::model::{AssetKind, ThumbnailRef};
use mosaic_discovery::{DiscoveryEngine, Source};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"x").unwrap();
}

fn media_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(&root.join("#holiday/sea.jpg"));
    touch(&root.join("#holiday/2023/hill.png"));
    touch(&root.join("clips/jump.mp4"));
    touch(&root.join("clips/jump_thumbnail.jpg"));
    touch(&root.join("notes/readme.txt"));
    touch(&root.join(".cache/hidden.jpg"));
    touch(&root.join("node_modules/pkg/logo.png"));
    dir
}

fn bookmark_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("Bookmarks");
    let tree = json!({
        "roots": {
            "bookmark_bar": {
                "type": "folder",
                "name": "Bookmarks bar",
                "children": [
                    {"type": "url", "id": "1", "name": "Crate docs", "url": "https://docs.rs",
                     "date_added": "13300000000000000"},
                    {"type": "folder", "id": "2", "name": "Watch later", "children": [
                        {"type": "url", "id": "3", "name": "Keynote",
                         "url": "https://www.youtube.com/watch?v=abcDEF12345"}
                    ]}
                ]
            },
            "other": {"type": "folder", "name": "Other bookmarks", "children": [
                {"type": "url", "id": "4", "name": "", "url": "https://example.org/page"}
            ]}
        }
    });
    fs::write(&path, serde_json::to_vec_pretty(&tree).unwrap()).unwrap();
    path
}

fn engine_for(media: Option<&Path>, bookmarks: Option<&Path>) -> DiscoveryEngine {
    let config = DiscoveryConfig {
        local: media.map(LocalFsConfig::new),
        bookmarks: bookmarks.map(|p| BookmarksConfig { path: p.to_path_buf() }),
        ..DiscoveryConfig::default()
    };
    DiscoveryEngine::new(config).unwrap()
}

#[tokio::test]
async fn test_local_media_folder() {
    let media = media_tree();
    let engine = engine_for(Some(media.path()), None);

    let report = engine.refresh().await;
    assert!(report.published());
    // sea, hill, jump video and its thumbnail image
    assert_eq!(report.asset_count, 4);

    let holiday = engine.list_by_tag("holiday");
    let titles: Vec<_> = holiday.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"sea") && titles.contains(&"hill"));

    let nested = engine.list_by_folder(Source::Local, &["#holiday".to_string(), "2023".to_string()]);
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].folder_path, vec!["#holiday", "2023"]);

    let video = engine.search("jump", 10).into_iter().find(|a| a.kind == AssetKind::Video).unwrap();
    assert_eq!(
        video.thumbnail_ref,
        Some(ThumbnailRef::File(media.path().join("clips/jump_thumbnail.jpg")))
    );

    let tree = engine.list_folders(Source::Local).unwrap();
    let top: Vec<_> = tree.children(tree.root()).map(|n| n.name.as_str()).collect();
    assert_eq!(top, vec!["#holiday", "clips"]);
}

#[tokio::test]
async fn test_missing_media_root_reports_unavailable() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(Some(&dir.path().join("gone")), None);

    let report = engine.refresh().await;
    assert!(report.published());
    assert_eq!(report.asset_count, 0);
    let status = &engine.current().sources[&Source::Local];
    assert!(status.enabled);
    assert!(!status.available);
}

#[tokio::test]
async fn test_bookmark_file_and_focus_modes() {
    let dir = TempDir::new().unwrap();
    let path = bookmark_file(dir.path());
    let engine = engine_for(None, Some(&path));

    let report = engine.refresh().await;
    assert_eq!(report.asset_count, 3);

    let keynote = engine.search("keynote", 1).remove(0);
    assert_eq!(keynote.kind, AssetKind::YoutubeVideo);
    assert_eq!(keynote.folder_path, vec!["Bookmarks bar", "Watch later"]);

    let untitled = engine.search("example.org", 1).remove(0);
    assert_eq!(untitled.title, "https://example.org/page");

    let all = engine.list_bookmarks_in_focus("all").unwrap();
    let titles: Vec<_> = all.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Crate docs", "Keynote", "https://example.org/page"]);
}

#[tokio::test]
async fn test_corrupt_bookmark_file_does_not_block_media() {
    let media = media_tree();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Bookmarks");
    fs::write(&path, b"{ not json").unwrap();

    let engine = engine_for(Some(media.path()), Some(&path));
    let report = engine.refresh().await;
    assert_eq!(report.asset_count, 4);

    let status = &engine.current().sources[&Source::Bookmark];
    assert!(!status.available);
    assert!(status.last_error.as_deref().unwrap().contains("Parse"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_media_entry_keeps_source_available() {
    let media = media_tree();
    std::os::unix::fs::symlink(media.path().join("nowhere.jpg"), media.path().join("broken.jpg")).unwrap();
    let engine = engine_for(Some(media.path()), None);

    let report = engine.refresh().await;
    assert_eq!(report.asset_count, 4);
    let status = &engine.current().sources[&Source::Local];
    assert!(status.available);
    assert!(status.last_success.is_some());
    assert!(status.last_error.as_deref().unwrap().contains("could not be read"));
}

#[tokio::test]
async fn test_deeply_nested_bookmark_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Bookmarks");
    let depth = 400;
    let mut text = String::from(r#"{"roots": {"bookmark_bar": {"type": "folder", "name": "Bar", "children": ["#);
    text.push_str(&r#"{"type": "folder", "name": "deeper", "children": ["#.repeat(depth));
    text.push_str(r#"{"type": "url", "name": "Bottom", "url": "https://bottom.example"}"#);
    text.push_str(&"]}".repeat(depth));
    text.push_str("]}}}");
    fs::write(&path, text).unwrap();

    let engine = engine_for(None, Some(&path));
    let report = engine.refresh().await;
    assert_eq!(report.asset_count, 1);
    let bottom = engine.search("bottom", 1).remove(0);
    assert_eq!(bottom.folder_path.len(), depth + 1);
    assert!(engine.current().sources[&Source::Bookmark].available);
}
