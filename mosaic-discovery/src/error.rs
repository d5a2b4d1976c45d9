//! Error types for mosaic-discovery
//!
//! Connector errors never escape a refresh: they end up in the source's
//! status. Normalization errors skip one record. Neither is fatal.

use crate::model::Source;
use std::path::PathBuf;
use thiserror::Error;

/// A connector could not produce (fresh) records
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectorError {
    /// The source has no location configured
    #[error("{0} source is not configured")]
    NotConfigured(Source),

    /// The source failed entirely
    #[error("{origin} unavailable: {reason}")]
    SourceUnavailable { origin: Source, reason: String },

    /// The fetch exceeded the per-connector timeout
    #[error("{origin} timed out after {seconds}s")]
    Timeout { origin: Source, seconds: u64 },

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Transport-level failure (connect, reset, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Filesystem failure
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

impl ConnectorError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Network(_) | ConnectorError::Timeout { .. } => true,
            ConnectorError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One raw record failed normalization
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed {origin} record {key}: {reason}")]
pub struct MalformedRecord {
    pub origin: Source,
    /// Source-local key (or best available description) of the record
    pub key: String,
    pub reason: String,
}
