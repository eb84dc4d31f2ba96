//! Core types and errors for the name checker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur while syncing or validating.
#[derive(Error, Debug)]
pub enum NameCheckError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// The connection was closed before the response formally ended.
    #[error("Stream closed early: {0}")]
    StreamClosedEarly(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Change record for {id:?} has no numeric sequence")]
    MissingSequence { id: String },

    #[error("Sequence would move backwards from {current} to {attempted}")]
    SequenceRegression { current: u64, attempted: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Package name must contain more than separators")]
    EmptyName,

    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl NameCheckError {
    /// Network failures the caller may want to retry on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::StreamClosedEarly(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NameCheckError>;

/// Local copy of all known package names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Every package name seen so far.
    pub names: BTreeSet<String>,
    /// Change feed position the names were captured at. `None` forces a full sync.
    pub sequence: Option<u64>,
}

/// Summary of the remote registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Current position of the registry change log.
    pub update_seq: u64,
    /// Number of documents (packages) in the registry.
    pub doc_count: u64,
    /// Estimated size of a full name listing, in bytes.
    pub approx_size_bytes: u64,
}

impl RemoteInfo {
    /// Build a summary, estimating the full listing size from the document count.
    ///
    /// The listing endpoint sends no content length, so the size is derived
    /// from an empirical documents-per-kilobyte ratio.
    pub fn new(update_seq: u64, doc_count: u64, docs_per_kilobyte: f64) -> Self {
        let kilobytes = if docs_per_kilobyte > 0.0 {
            (doc_count as f64 / docs_per_kilobyte).round() as u64
        } else {
            0
        };
        Self {
            update_seq,
            doc_count,
            approx_size_bytes: kilobytes * 1024,
        }
    }
}

/// One entry of the incremental change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Package name that changed.
    pub id: String,
    /// Sequence position right after this change.
    pub sequence_after: u64,
}

/// Outcome of a validation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Syntax is acceptable (syntax-only check).
    Valid,
    /// Syntax rules rejected the name.
    Invalid,
    /// No similar name exists.
    Available,
    /// One or more similar names exist.
    Unavailable,
}

/// Result of validating one candidate name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub query_name: String,
    pub status: ValidationStatus,
    /// Existing names that collide with the candidate, sorted.
    pub conflicting_names: Vec<String>,
    /// Naming rule violations, errors first then warnings.
    pub syntax_errors: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn new(query_name: &str, status: ValidationStatus) -> Self {
        Self {
            query_name: query_name.to_string(),
            status,
            conflicting_names: Vec::new(),
            syntax_errors: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_info_size_estimate() {
        let info = RemoteInfo::new(10, 93_000, 9.3);
        assert_eq!(info.approx_size_bytes, 10_000 * 1024);
    }

    #[test]
    fn test_remote_info_zero_ratio() {
        let info = RemoteInfo::new(10, 93_000, 0.0);
        assert_eq!(info.approx_size_bytes, 0);
    }

    #[test]
    fn test_transient_classification() {
        assert!(NameCheckError::StreamClosedEarly("eof".into()).is_transient());
        assert!(NameCheckError::HttpStatus { url: "u".into(), status: 503 }.is_transient());
        assert!(!NameCheckError::Cancelled.is_transient());
        assert!(!NameCheckError::EmptyName.is_transient());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ValidationStatus::Unavailable).unwrap();
        assert_eq!(json, "\"unavailable\"");
    }
}
