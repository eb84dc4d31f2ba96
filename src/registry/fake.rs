//! In-memory registry used by tests.

use crate::cancel::CancelToken;
use crate::registry::{DownloadProgress, FullListing, ProgressFn, Registry};
use crate::types::{ChangeRecord, NameCheckError, RemoteInfo, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct FakeRegistry {
    pub info: RemoteInfo,
    pub names: Vec<String>,
    pub changes: Vec<ChangeRecord>,
    jitter: bool,
    close_at: Option<u64>,
    failure: Option<fn() -> NameCheckError>,
    pub listing_calls: AtomicUsize,
    pub change_calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn new(update_seq: u64, doc_count: u64) -> Self {
        Self {
            info: RemoteInfo::new(update_seq, doc_count, 9.3),
            names: Vec::new(),
            changes: Vec::new(),
            jitter: false,
            close_at: None,
            failure: None,
            listing_calls: AtomicUsize::new(0),
            change_calls: AtomicUsize::new(0),
        }
    }

    /// Registry whose change log holds the given `(id, sequence)` pairs.
    pub fn with_changes<I>(update_seq: u64, changes: I) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut registry = Self::new(update_seq, 0);
        registry.changes = changes
            .into_iter()
            .map(|(id, sequence_after)| ChangeRecord { id, sequence_after })
            .collect();
        registry.info.doc_count = registry.changes.len() as u64;
        registry
    }

    pub fn with_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Delay early windows longer than later ones so pages complete out of order.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Report a premature close for any page starting at or after `sequence`.
    pub fn closing_at(mut self, sequence: u64) -> Self {
        self.close_at = Some(sequence);
        self
    }

    /// Fail every page and listing request with the given error.
    pub fn failing_with(mut self, failure: fn() -> NameCheckError) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn remote_info(&self) -> Result<RemoteInfo> {
        Ok(self.info)
    }

    async fn fetch_all_names(
        &self,
        cancel: &CancelToken,
        on_progress: ProgressFn<'_>,
    ) -> Result<FullListing> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        if cancel.is_cancelled() {
            return Err(NameCheckError::Cancelled);
        }

        let bytes = serde_json::to_vec(&self.names)?.len() as u64;
        on_progress(DownloadProgress::new(
            bytes / 2,
            self.info.approx_size_bytes,
            Duration::from_millis(5),
        ));
        on_progress(DownloadProgress::new(bytes, bytes, Duration::from_millis(10)));

        Ok(FullListing {
            sequence: self.info.update_seq,
            names: self.names.iter().cloned().collect(),
        })
    }

    async fn fetch_changes(&self, since: u64, limit: usize) -> Result<Vec<ChangeRecord>> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        if self.close_at.is_some_and(|close| since >= close) {
            return Err(NameCheckError::StreamClosedEarly("premature close".into()));
        }
        if self.jitter {
            let delay = 20u64.saturating_sub(since / 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(self
            .changes
            .iter()
            .filter(|c| c.sequence_after > since)
            .take(limit)
            .cloned()
            .collect())
    }
}
