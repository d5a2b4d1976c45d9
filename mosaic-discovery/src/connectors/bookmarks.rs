//! Browser bookmark tree connector
//!
//! Reads a Chromium-style `Bookmarks` JSON file. Roots are walked in a fixed
//! order (`bookmark_bar`, `other`, `synced`, `mobile`) with an explicit
//! stack, so arbitrarily deep trees cannot exhaust the native stack.

use super::{Connector, FetchOutcome, RawRecord};
use crate::error::ConnectorError;
use crate::model::Source;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const ROOT_ORDER: [&str; 4] = ["bookmark_bar", "other", "synced", "mobile"];

/// One URL node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkRecord {
    /// Browser-assigned node id
    pub node_id: Option<String>,
    pub title: String,
    pub url: String,
    /// Root label first, then nested folder names
    pub folder_path: Vec<String>,
    /// WebKit microseconds since 1601-01-01
    pub date_added: Option<i64>,
}

impl BookmarkRecord {
    /// Source-local key: the node id, or folder path plus URL
    pub fn local_key(&self) -> String {
        match &self.node_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}|{}", self.folder_path.join("/"), self.url),
        }
    }
}

/// How a bookmark URL is presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlClass {
    YouTube { video_id: String },
    Generic,
}

/// Classify a URL as a YouTube video or a generic bookmark
pub fn classify_url(url: &str) -> UrlClass {
    match extract_youtube_id(url) {
        Some(video_id) => UrlClass::YouTube { video_id },
        None => UrlClass::Generic,
    }
}

/// Video id from watch, short-link, shorts, embed and live URLs
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let candidate = match host {
        "youtu.be" => parsed.path_segments()?.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = parsed.path_segments()?;
            match segments.next() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts") | Some("embed") | Some("live") | Some("v") => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }
        }
        _ => None,
    }?;

    let valid = !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(candidate)
}

/// Parsed records plus a non-fatal problem, if any
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub records: Vec<RawRecord>,
    pub error: Option<ConnectorError>,
}

/// Walk a bookmark document
///
/// Nodes that are neither folders nor URLs, and URL nodes with an empty
/// URL, are skipped with a warning. A folder id already visited is not
/// entered again.
pub fn parse_bookmarks(doc: &Value) -> ParseResult {
    let roots = match doc.get("roots").and_then(Value::as_object) {
        Some(roots) => roots,
        None => {
            return ParseResult {
                records: Vec::new(),
                error: Some(ConnectorError::Parse("bookmark file has no roots".to_string())),
            }
        }
    };

    let mut records = Vec::new();
    let mut visited_folders = HashSet::new();
    let mut skipped = 0usize;
    // (parent folder, name); paths are materialized only for URL nodes
    let mut folders: Vec<(Option<usize>, String)> = Vec::new();

    for key in ROOT_ORDER {
        let root = match roots.get(key) {
            Some(root) if root.is_object() => root,
            _ => continue,
        };
        let root_label = root
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_root_label(key));
        folders.push((None, root_label));

        let mut stack: Vec<(&Value, usize)> = Vec::new();
        push_children(root, folders.len() - 1, &mut stack);

        while let Some((node, parent)) = stack.pop() {
            match node.get("type").and_then(Value::as_str) {
                Some("folder") => {
                    if let Some(id) = node.get("id").and_then(Value::as_str) {
                        if !visited_folders.insert(id.to_string()) {
                            tracing::warn!(node_id = id, "Bookmark folder seen twice, skipping");
                            continue;
                        }
                    }
                    let name = node
                        .get("name")
                        .and_then(Value::as_str)
                        .filter(|n| !n.is_empty())
                        .unwrap_or("(unnamed folder)");
                    folders.push((Some(parent), name.to_string()));
                    push_children(node, folders.len() - 1, &mut stack);
                }
                Some("url") => {
                    let url = node.get("url").and_then(Value::as_str).unwrap_or("").trim();
                    if url.is_empty() {
                        skipped += 1;
                        continue;
                    }
                    let title = node
                        .get("name")
                        .and_then(Value::as_str)
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or(url);
                    records.push(RawRecord::Bookmark(BookmarkRecord {
                        node_id: node.get("id").and_then(Value::as_str).map(str::to_string),
                        title: title.to_string(),
                        url: url.to_string(),
                        folder_path: folder_path(&folders, parent),
                        date_added: node.get("date_added").and_then(parse_webkit_value),
                    }));
                }
                _ => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "Skipped unusable bookmark nodes");
    }

    ParseResult { records, error: None }
}

/// Children pushed in reverse so the stack pops them in document order
fn push_children<'a>(node: &'a Value, folder: usize, stack: &mut Vec<(&'a Value, usize)>) {
    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children.iter().rev() {
            stack.push((child, folder));
        }
    }
}

fn folder_path(folders: &[(Option<usize>, String)], folder: usize) -> Vec<String> {
    let mut path = Vec::new();
    let mut cursor = Some(folder);
    while let Some(idx) = cursor {
        let (parent, name) = &folders[idx];
        path.push(name.clone());
        cursor = *parent;
    }
    path.reverse();
    path
}

/// Parse a bookmark file of any nesting depth
///
/// The recursion limit is lifted and the deserializer grows its stack on
/// demand, so the depth of the tree is bounded only by memory.
pub fn read_bookmark_document(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    let mut json = serde_json::Deserializer::from_slice(bytes);
    json.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut json))?;
    json.end()?;
    Ok(value)
}

/// Drop a document without recursing into nested containers
fn release(doc: Value) {
    let mut stack = vec![doc];
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items),
            Value::Object(map) => stack.extend(map.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}

/// Chromium stores `date_added` as a decimal string
fn parse_webkit_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

fn default_root_label(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Bookmark file connector
pub struct BookmarksConnector {
    path: PathBuf,
}

impl BookmarksConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for BookmarksConnector {
    fn source(&self) -> Source {
        Source::Bookmark
    }

    async fn fetch(&self) -> FetchOutcome {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read bookmark file");
                return FetchOutcome::failed(
                    Source::Bookmark,
                    ConnectorError::Io {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    },
                );
            }
        };

        let doc = match read_bookmark_document(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Malformed bookmark file");
                return FetchOutcome::failed(Source::Bookmark, ConnectorError::Parse(e.to_string()));
            }
        };

        let parsed = parse_bookmarks(&doc);
        release(doc);
        FetchOutcome {
            source: Source::Bookmark,
            records: parsed.records,
            error: parsed.error,
            stale: false,
        }
    }
}
