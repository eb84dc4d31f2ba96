//! Remote npm registry access.
//!
//! Fetches the registry summary, the full name listing and pages of the
//! change feed. The [`Registry`] trait is the seam the sync engine works
//! against; [`RegistryClient`] is the HTTP implementation.

pub mod changes;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use changes::{follow_changes, ChangeFeed, FeedOptions, FeedOutcome};
pub use client::{RegistryClient, RegistryEndpoints};

use crate::cancel::CancelToken;
use crate::types::{ChangeRecord, RemoteInfo, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

/// Byte-level progress of a full listing download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub received_bytes: u64,
    /// Expected size. Raised to `received_bytes` once the estimate is exceeded.
    pub total_bytes: u64,
    pub elapsed: Duration,
    /// Average transfer rate since the download started.
    pub bytes_per_sec: f64,
}

impl DownloadProgress {
    pub(crate) fn new(received_bytes: u64, estimated_bytes: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            received_bytes,
            total_bytes: estimated_bytes.max(received_bytes),
            elapsed,
            bytes_per_sec: if secs > 0.0 {
                received_bytes as f64 / secs
            } else {
                0.0
            },
        }
    }
}

/// Every package name in the registry, captured at `sequence`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullListing {
    pub sequence: u64,
    pub names: BTreeSet<String>,
}

/// Progress callback for listing downloads.
pub type ProgressFn<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Source of registry data.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Registry summary, fetched once and reused afterwards.
    async fn remote_info(&self) -> Result<RemoteInfo>;

    /// Download every package name.
    ///
    /// The returned sequence is the registry position captured before the
    /// download started, so changes made during the download are replayed
    /// by the next incremental update.
    async fn fetch_all_names(
        &self,
        cancel: &CancelToken,
        on_progress: ProgressFn<'_>,
    ) -> Result<FullListing>;

    /// Up to `limit` change records with a sequence greater than `since`,
    /// ordered by sequence.
    async fn fetch_changes(&self, since: u64, limit: usize) -> Result<Vec<ChangeRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rebaselines_total() {
        let progress = DownloadProgress::new(2048, 1024, Duration::from_secs(2));
        assert_eq!(progress.total_bytes, 2048);
        assert_eq!(progress.bytes_per_sec, 1024.0);
    }

    #[test]
    fn test_progress_unknown_total() {
        let progress = DownloadProgress::new(10, 0, Duration::ZERO);
        assert_eq!(progress.total_bytes, 10);
        assert_eq!(progress.bytes_per_sec, 0.0);
    }
}
