//! Asset-manager HTTP API connector
//!
//! Two listings are read on every fetch:
//! - `GET {base}/api/folder/list` - nested folder tree
//! - `GET {base}/api/item/list?limit=N[&cursor=C]` - paged items
//!
//! Both answer with `{"status": "success", "data": ..., "nextCursor": ...}`.
//! Transient failures are retried with backoff. When a fetch fails after a
//! previous success, the cached records of that success are served stale.

use super::{Connector, FetchOutcome, RawRecord};
use crate::config::AssetManagerConfig;
use crate::error::ConnectorError;
use crate::model::Source;
use crate::retry::retry_transient;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

const USER_AGENT: &str = concat!("mosaic-discovery/", env!("CARGO_PKG_VERSION"));

/// One item as listed by the asset manager, with folder ids resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerItem {
    pub id: String,
    pub name: String,
    /// Lowercase, no dot
    pub ext: String,
    pub tags: Vec<String>,
    /// Name chain of every folder the item belongs to; unknown ids dropped
    pub folder_paths: Vec<Vec<String>>,
    /// Epoch milliseconds
    pub created_at_ms: Option<i64>,
    /// Library directory for resolving files, when configured
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFolder {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    children: Vec<ApiFolder>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiItem {
    id: String,
    name: String,
    ext: String,
    tags: Vec<String>,
    folders: Vec<String>,
    btime: Option<i64>,
    #[serde(rename = "modificationTime")]
    modification_time: Option<i64>,
    #[serde(rename = "isDeleted")]
    is_deleted: bool,
}

/// Asset-manager connector
pub struct AssetManagerConnector {
    http_client: reqwest::Client,
    config: AssetManagerConfig,
    last_good: Mutex<Option<Vec<RawRecord>>>,
}

impl AssetManagerConnector {
    pub fn new(config: AssetManagerConfig) -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConnectorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
            last_good: Mutex::new(None),
        })
    }

    /// Full listing: folder tree first, then every item page
    pub async fn fetch_items(&self) -> Result<Vec<ManagerItem>, ConnectorError> {
        let folders = self.fetch_folder_paths().await?;

        let mut items = Vec::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<String> = None;

        for page in 0..self.config.max_pages {
            let (raw_items, next) = self.fetch_item_page(cursor.as_deref()).await?;
            tracing::debug!(page, items = raw_items.len(), "Fetched asset-manager page");

            for value in raw_items {
                match serde_json::from_value::<ApiItem>(value) {
                    Ok(item) if item.is_deleted => {}
                    Ok(item) => items.push(self.resolve_item(item, &folders)),
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable asset-manager item"),
                }
            }

            match next {
                None => return Ok(items),
                Some(next) => {
                    if !seen_cursors.insert(next.clone()) {
                        tracing::warn!(cursor = %next, "Cursor repeated, stopping pagination");
                        return Ok(items);
                    }
                    cursor = Some(next);
                }
            }
        }

        tracing::warn!(
            max_pages = self.config.max_pages,
            items = items.len(),
            "Page limit reached, listing truncated"
        );
        Ok(items)
    }

    async fn fetch_folder_paths(&self) -> Result<HashMap<String, Vec<String>>, ConnectorError> {
        let url = format!("{}/api/folder/list", self.config.base_url);
        let envelope: ApiEnvelope<Vec<ApiFolder>> = self.get_json("folder list", &url, &[]).await?;
        Ok(flatten_folders(envelope.data.unwrap_or_default()))
    }

    async fn fetch_item_page(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<serde_json::Value>, Option<String>), ConnectorError> {
        let url = format!("{}/api/item/list", self.config.base_url);
        let mut params = vec![("limit", self.config.page_size.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        let envelope: ApiEnvelope<Vec<serde_json::Value>> =
            self.get_json("item list", &url, &params).await?;
        let next = envelope.next_cursor.filter(|c| !c.is_empty());
        Ok((envelope.data.unwrap_or_default(), next))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, ConnectorError> {
        let envelope: ApiEnvelope<T> = retry_transient(operation, &self.config.retry, || async move {
            tracing::debug!(url = %url, ?params, "Querying asset-manager API");

            let response = self
                .http_client
                .get(url)
                .query(params)
                .send()
                .await
                .map_err(|e| ConnectorError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ConnectorError::Http {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .json::<ApiEnvelope<T>>()
                .await
                .map_err(|e| ConnectorError::Parse(e.to_string()))
        })
        .await?;

        if envelope.status != "success" {
            return Err(ConnectorError::SourceUnavailable {
                origin: Source::AssetManager,
                reason: envelope
                    .message
                    .unwrap_or_else(|| format!("{} returned status '{}'", operation, envelope.status)),
            });
        }
        Ok(envelope)
    }

    fn resolve_item(&self, item: ApiItem, folders: &HashMap<String, Vec<String>>) -> ManagerItem {
        ManagerItem {
            folder_paths: item
                .folders
                .iter()
                .filter_map(|id| folders.get(id).cloned())
                .collect(),
            id: item.id,
            name: item.name,
            ext: item.ext.trim_start_matches('.').to_ascii_lowercase(),
            tags: item.tags,
            created_at_ms: item.btime.or(item.modification_time),
            library_path: self.config.library_path.clone(),
        }
    }

    fn cached(&self) -> Option<Vec<RawRecord>> {
        match self.last_good.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn remember(&self, records: &[RawRecord]) {
        let mut guard = match self.last_good.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(records.to_vec());
    }
}

/// Map folder id to its name chain, walking the tree with an explicit stack
///
/// A folder id seen twice is entered only once.
fn flatten_folders(roots: Vec<ApiFolder>) -> HashMap<String, Vec<String>> {
    let mut paths = HashMap::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(ApiFolder, Vec<String>)> =
        roots.into_iter().rev().map(|f| (f, Vec::new())).collect();

    while let Some((folder, parent_path)) = stack.pop() {
        if !visited.insert(folder.id.clone()) {
            tracing::warn!(folder_id = %folder.id, "Folder listed twice, skipping");
            continue;
        }
        let mut path = parent_path;
        path.push(folder.name);
        for child in folder.children.into_iter().rev() {
            stack.push((child, path.clone()));
        }
        paths.insert(folder.id, path);
    }

    paths
}

#[async_trait]
impl Connector for AssetManagerConnector {
    fn source(&self) -> Source {
        Source::AssetManager
    }

    async fn fetch(&self) -> FetchOutcome {
        match self.fetch_items().await {
            Ok(items) => {
                let records: Vec<RawRecord> = items.into_iter().map(RawRecord::AssetManager).collect();
                self.remember(&records);
                FetchOutcome::fresh(Source::AssetManager, records)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Asset-manager fetch failed");
                match self.cached() {
                    Some(records) => FetchOutcome::stale(Source::AssetManager, records, e),
                    None => FetchOutcome::failed(Source::AssetManager, e),
                }
            }
        }
    }

    fn fallback(&self) -> Option<Vec<RawRecord>> {
        self.cached()
    }
}
