//! Configuration resolution and graceful degradation
//!
//! Tests that touch MOSAIC_* environment variables are marked #[serial]
//! so they never observe each other's settings.

use mosaic_common::config::{
    load_toml_config, ConfigResolver, SourcesConfig, ENV_ASSET_MANAGER_URL, ENV_BOOKMARKS,
    ENV_CONFIG_PATH, ENV_MEDIA_ROOT,
};
use mosaic_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_env() {
    for name in [ENV_CONFIG_PATH, ENV_MEDIA_ROOT, ENV_ASSET_MANAGER_URL, ENV_BOOKMARKS] {
        env::remove_var(name);
    }
}

const SAMPLE: &str = r#"
[logging]
level = "debug"

[sources]
media_root = "/srv/media"
media_extensions = ["jpg", "mp4"]
asset_manager_url = "http://localhost:41595"
bookmarks_path = "/home/me/Bookmarks"

[discovery]
cluster_threshold = 0.5
trending_window_secs = 3600

[discovery.feed_slots]
trending = 5

[asset_manager]
page_size = 50

[[focus_modes]]
id = "Design"
keywords = ["figma", "dribbble"]
exclude_urls = ["ads."]
"#;

#[test]
fn test_load_full_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.sources.media_root, Some(PathBuf::from("/srv/media")));
    assert_eq!(config.discovery.cluster_threshold, Some(0.5));
    assert_eq!(config.discovery.feed_slots.trending, Some(5));
    assert_eq!(config.discovery.feed_slots.hero, None);
    assert_eq!(config.asset_manager.page_size, Some(50));
    assert_eq!(config.focus_modes.len(), 1);
    assert_eq!(config.focus_modes[0].keywords, vec!["figma", "dribbble"]);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[sources\nmedia_root = ").unwrap();

    match load_toml_config(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse")),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_explicit_missing_config_file_errors() {
    clear_env();
    let resolver = ConfigResolver::new().with_config_path(Some(PathBuf::from(
        "/nonexistent/mosaic/config.toml",
    )));
    assert!(matches!(resolver.resolve(), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_config_path_is_used() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    env::set_var(ENV_CONFIG_PATH, &path);

    let config = ConfigResolver::new().resolve().unwrap();
    assert_eq!(config.logging.level, "debug");

    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_toml_and_cli_overrides_env() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    env::set_var(ENV_MEDIA_ROOT, "/from/env");
    env::set_var(ENV_ASSET_MANAGER_URL, "http://env:1");

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .with_source_overrides(SourcesConfig {
            asset_manager_url: Some("http://cli:2".to_string()),
            ..Default::default()
        })
        .resolve()
        .unwrap();

    assert_eq!(config.sources.media_root, Some(PathBuf::from("/from/env")));
    assert_eq!(config.sources.asset_manager_url.as_deref(), Some("http://cli:2"));
    assert_eq!(
        config.sources.bookmarks_path,
        Some(PathBuf::from("/home/me/Bookmarks"))
    );

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();
    env::set_var(ENV_MEDIA_ROOT, "   ");

    let config = ConfigResolver::new()
        .with_config_path(Some(path))
        .resolve()
        .unwrap();
    assert_eq!(config.sources.media_root, Some(PathBuf::from("/srv/media")));

    clear_env();
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_browser_default_used_only_when_present() {
    clear_env();
    let previous = env::var_os("XDG_CONFIG_HOME");
    let home = tempfile::tempdir().unwrap();
    env::set_var("XDG_CONFIG_HOME", home.path());

    let path = home.path().join("config.toml");
    std::fs::write(&path, "[sources]\nmedia_root = \"/srv/media\"\n").unwrap();
    let resolver = ConfigResolver::new().with_config_path(Some(path));

    assert_eq!(resolver.resolve().unwrap().sources.bookmarks_path, None);

    let chrome = home.path().join("google-chrome/Default/Bookmarks");
    std::fs::create_dir_all(chrome.parent().unwrap()).unwrap();
    std::fs::write(&chrome, "{}").unwrap();
    assert_eq!(resolver.resolve().unwrap().sources.bookmarks_path, Some(chrome));

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }
    clear_env();
}
