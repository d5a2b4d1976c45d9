//! Source connectors
//!
//! Each connector fetches raw records from exactly one source and knows
//! nothing about the others. All connectors run concurrently; a failed or
//! hung connector only affects the slice of assets it owns.
//!
//! # Connectors
//! 1. **local_fs** - walk a media directory
//! 2. **asset_manager** - page through the asset-manager HTTP API
//! 3. **bookmarks** - parse the browser bookmark tree

pub mod asset_manager;
pub mod bookmarks;
pub mod local_fs;

pub use asset_manager::{AssetManagerConnector, ManagerItem};
pub use bookmarks::{BookmarkRecord, BookmarksConnector};
pub use local_fs::{LocalFsConnector, LocalRecord};

use crate::config::DiscoveryConfig;
use crate::error::ConnectorError;
use crate::model::{AssetId, Source};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One raw record, tagged by the source that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Local(LocalRecord),
    AssetManager(ManagerItem),
    Bookmark(BookmarkRecord),
}

impl RawRecord {
    pub fn source(&self) -> Source {
        match self {
            RawRecord::Local(_) => Source::Local,
            RawRecord::AssetManager(_) => Source::AssetManager,
            RawRecord::Bookmark(_) => Source::Bookmark,
        }
    }

    /// Key identifying the record within its source
    pub fn local_key(&self) -> String {
        match self {
            RawRecord::Local(r) => r.relative_path.clone(),
            RawRecord::AssetManager(r) => r.id.trim().to_string(),
            RawRecord::Bookmark(r) => r.local_key(),
        }
    }

    /// Stable id the normalized asset will carry
    pub fn asset_id(&self) -> AssetId {
        AssetId::derive(self.source(), &self.local_key())
    }
}

/// Result of one connector fetch
///
/// Records may be present together with an error: a stale fallback, or a
/// partial tree with a non-fatal parse problem.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub source: Source,
    pub records: Vec<RawRecord>,
    pub error: Option<ConnectorError>,
    /// Records are the previous successful fetch, not fresh data
    pub stale: bool,
}

impl FetchOutcome {
    pub fn fresh(source: Source, records: Vec<RawRecord>) -> Self {
        Self {
            source,
            records,
            error: None,
            stale: false,
        }
    }

    pub fn failed(source: Source, error: ConnectorError) -> Self {
        Self {
            source,
            records: Vec::new(),
            error: Some(error),
            stale: false,
        }
    }

    pub fn stale(source: Source, records: Vec<RawRecord>, error: ConnectorError) -> Self {
        Self {
            source,
            records,
            error: Some(error),
            stale: true,
        }
    }

    /// Fresh records delivered alongside a non-fatal problem
    pub fn partial(source: Source, records: Vec<RawRecord>, error: ConnectorError) -> Self {
        Self {
            source,
            records,
            error: Some(error),
            stale: false,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Fresh data arrived, possibly with some entries missing
    pub fn delivered(&self) -> bool {
        self.succeeded() || (!self.stale && !self.records.is_empty())
    }
}

/// A source of raw records
#[async_trait]
pub trait Connector: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch the complete current record set; never panics, never escalates
    async fn fetch(&self) -> FetchOutcome;

    /// Records to serve when `fetch` did not finish within the timeout
    fn fallback(&self) -> Option<Vec<RawRecord>> {
        None
    }
}

/// The configured connectors, run concurrently with a per-connector timeout
pub struct ConnectorSet {
    connectors: Vec<Arc<dyn Connector>>,
    timeout: Duration,
}

impl ConnectorSet {
    pub fn new(connectors: Vec<Arc<dyn Connector>>, timeout: Duration) -> Self {
        Self { connectors, timeout }
    }

    /// One connector per configured source
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, ConnectorError> {
        let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();
        if let Some(local) = &config.local {
            connectors.push(Arc::new(LocalFsConnector::new(local.clone())));
        }
        if let Some(am) = &config.asset_manager {
            connectors.push(Arc::new(AssetManagerConnector::new(am.clone())?));
        }
        if let Some(bookmarks) = &config.bookmarks {
            connectors.push(Arc::new(BookmarksConnector::new(bookmarks.path.clone())));
        }
        Ok(Self::new(connectors, config.connector_timeout))
    }

    /// Sources with a connector in this set
    pub fn sources(&self) -> Vec<Source> {
        self.connectors.iter().map(|c| c.source()).collect()
    }

    pub fn count(&self) -> usize {
        self.connectors.len()
    }

    /// Fetch from all connectors concurrently
    ///
    /// Outcomes keep connector order. A connector exceeding the timeout
    /// yields its fallback (marked stale) or an empty failed outcome.
    pub async fn fetch_all(&self) -> Vec<FetchOutcome> {
        let timeout = self.timeout;
        let futures = self.connectors.iter().map(|connector| {
            let connector = Arc::clone(connector);
            async move {
                let source = connector.source();
                match tokio::time::timeout(timeout, connector.fetch()).await {
                    Ok(outcome) => {
                        debug!(
                            source = %source,
                            records = outcome.records.len(),
                            stale = outcome.stale,
                            "Connector fetch finished"
                        );
                        outcome
                    }
                    Err(_) => {
                        let error = ConnectorError::Timeout {
                            origin: source,
                            seconds: timeout.as_secs(),
                        };
                        warn!(source = %source, error = %error, "Connector timed out");
                        match connector.fallback() {
                            Some(records) => FetchOutcome::stale(source, records, error),
                            None => FetchOutcome::failed(source, error),
                        }
                    }
                }
            }
        });

        join_all(futures).await
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockConnector;
    use super::*;

    fn bookmark(title: &str) -> RawRecord {
        RawRecord::Bookmark(BookmarkRecord {
            node_id: Some(title.to_string()),
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            folder_path: vec!["Bookmarks bar".to_string()],
            date_added: None,
        })
    }

    #[tokio::test]
    async fn test_fetch_all_isolates_failures() {
        let set = ConnectorSet::new(
            vec![
                Arc::new(MockConnector::ok(Source::Bookmark, vec![bookmark("a")])),
                Arc::new(MockConnector::failing(Source::AssetManager)),
            ],
            Duration::from_secs(5),
        );

        let outcomes = set.fetch_all().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].succeeded());
        assert_eq!(outcomes[0].records.len(), 1);
        assert!(!outcomes[1].succeeded());
        assert!(outcomes[1].records.is_empty());
    }

    #[tokio::test]
    async fn test_hung_connector_times_out_with_fallback() {
        let mut slow = MockConnector::ok(Source::AssetManager, vec![]);
        slow.delay = Duration::from_secs(30);
        slow.fallback = Some(vec![bookmark("cached")]);

        let set = ConnectorSet::new(
            vec![
                Arc::new(slow),
                Arc::new(MockConnector::ok(Source::Bookmark, vec![bookmark("b")])),
            ],
            Duration::from_millis(50),
        );

        let outcomes = set.fetch_all().await;
        assert!(outcomes[0].stale);
        assert!(matches!(outcomes[0].error, Some(ConnectorError::Timeout { .. })));
        assert_eq!(outcomes[0].records.len(), 1);
        assert!(outcomes[1].succeeded());
    }

    #[test]
    fn test_empty_config_has_no_connectors() {
        let set = ConnectorSet::from_config(&DiscoveryConfig::default()).unwrap();
        assert_eq!(set.count(), 0);
    }
}
