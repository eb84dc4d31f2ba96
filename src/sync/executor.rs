//! Runs a chosen refresh strategy against the snapshot store.

use crate::cancel::CancelToken;
use crate::registry::{follow_changes, DownloadProgress, FeedOptions, Registry};
use crate::snapshot::SnapshotStore;
use crate::sync::progress::{SyncEvent, SyncObserver};
use crate::types::{NameCheckError, RemoteInfo, Result};
use tracing::{debug, info};

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Names in the snapshot afterwards.
    pub names: usize,
    /// Sequence the snapshot was saved at.
    pub sequence: u64,
    /// Change records applied (incremental only).
    pub applied: u64,
    /// The change feed closed before reaching the target.
    pub closed_early: bool,
}

/// Streams registry data into the snapshot store.
///
/// Nothing is written until a download has finished, so a failed or
/// cancelled run leaves the previous snapshot untouched.
pub struct SyncExecutor<'a, R: Registry + ?Sized> {
    registry: &'a R,
    store: &'a mut SnapshotStore,
    observer: &'a dyn SyncObserver,
    cancel: CancelToken,
    feed: FeedOptions,
}

impl<'a, R: Registry + ?Sized> SyncExecutor<'a, R> {
    pub fn new(
        registry: &'a R,
        store: &'a mut SnapshotStore,
        observer: &'a dyn SyncObserver,
        cancel: CancelToken,
        feed: FeedOptions,
    ) -> Self {
        Self {
            registry,
            store,
            observer,
            cancel,
            feed,
        }
    }

    /// Replace the snapshot with a fresh full listing.
    pub async fn run_full(&mut self, remote: &RemoteInfo) -> Result<SyncReport> {
        info!("Downloading all names from the registry");
        self.observer.on_event(&SyncEvent::DownloadStarted {
            estimated_bytes: remote.approx_size_bytes,
        });

        let observer = self.observer;
        let on_progress = |progress: DownloadProgress| {
            observer.on_event(&SyncEvent::Download(progress));
        };
        let listing = self
            .registry
            .fetch_all_names(&self.cancel, &on_progress)
            .await?;

        let names = listing.names.len();
        self.observer
            .on_event(&SyncEvent::DownloadComplete { names });

        if self.cancel.is_cancelled() {
            return Err(NameCheckError::Cancelled);
        }
        self.store.save(listing.names, listing.sequence)?;
        self.observer.on_event(&SyncEvent::Saved {
            names,
            sequence: listing.sequence,
        });

        Ok(SyncReport {
            names,
            sequence: listing.sequence,
            applied: 0,
            closed_early: false,
        })
    }

    /// Replay changes since the snapshot's sequence and merge them in.
    ///
    /// A premature close of the feed connection still commits what was
    /// received, at the sequence reached.
    pub async fn run_incremental(&mut self, remote: &RemoteInfo) -> Result<SyncReport> {
        let since = self.store.load()?.sequence;
        let target = remote.update_seq;
        let expected = target.saturating_sub(since.unwrap_or(0));
        info!("Fetching updates since {:?} (target {})", since, target);
        self.observer
            .on_event(&SyncEvent::ChangesStarted { since, target });

        let observer = self.observer;
        let mut ids = Vec::new();
        let outcome = follow_changes(self.registry, since, self.feed, &self.cancel, |record| {
            ids.push(record.id);
            observer.on_event(&SyncEvent::ChangeApplied {
                applied: ids.len() as u64,
                expected,
            });
        })
        .await?;

        self.observer.on_event(&SyncEvent::ChangesComplete {
            applied: outcome.records,
            sequence: outcome.sequence,
            closed_early: outcome.closed_early,
        });

        if self.cancel.is_cancelled() {
            return Err(NameCheckError::Cancelled);
        }
        let added = self.store.merge(ids, outcome.sequence)?;
        let names = self.store.load()?.names.len();
        debug!(
            "Applied {} changes ({} new names) up to {}",
            outcome.records, added, outcome.sequence
        );
        self.observer.on_event(&SyncEvent::Saved {
            names,
            sequence: outcome.sequence,
        });

        Ok(SyncReport {
            names,
            sequence: outcome.sequence,
            applied: outcome.records,
            closed_early: outcome.closed_early,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeRegistry;
    use crate::sync::progress::recording::RecordingObserver;
    use crate::sync::progress::NoopObserver;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_full_refresh_replaces_names() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save(set(&["stale-name"]), 3).unwrap();

        let registry = FakeRegistry::new(10, 2).with_names(&["lodash", "react"]);
        let observer = RecordingObserver::default();
        let remote = registry.info;

        let report = SyncExecutor::new(
            &registry,
            &mut store,
            &observer,
            CancelToken::new(),
            FeedOptions::default(),
        )
        .run_full(&remote)
        .await
        .unwrap();

        assert_eq!(report.names, 2);
        assert_eq!(report.sequence, 10);

        let mut reopened = SnapshotStore::open(dir.path()).unwrap();
        let snapshot = reopened.load().unwrap();
        assert_eq!(snapshot.names, set(&["lodash", "react"]));
        assert_eq!(snapshot.sequence, Some(10));

        let events = observer.events();
        assert!(events.iter().any(|e| matches!(e, SyncEvent::Download(_))));
        assert!(matches!(events.last(), Some(SyncEvent::Saved { names: 2, sequence: 10 })));
    }

    #[tokio::test]
    async fn test_incremental_merges_changes() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save(set(&["lodash"]), 2).unwrap();

        let registry = FakeRegistry::with_changes(
            6,
            vec![
                ("old".to_string(), 1),
                ("react".to_string(), 3),
                ("lodash".to_string(), 4),
                ("react".to_string(), 6),
            ],
        );
        let remote = registry.info;

        let report = SyncExecutor::new(
            &registry,
            &mut store,
            &NoopObserver,
            CancelToken::new(),
            FeedOptions { page_size: 2, concurrency: 2 },
        )
        .run_incremental(&remote)
        .await
        .unwrap();

        assert_eq!(report.applied, 3);
        assert_eq!(report.sequence, 6);
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.names, set(&["lodash", "react"]));
        assert_eq!(snapshot.sequence, Some(6));
    }

    #[tokio::test]
    async fn test_incremental_from_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();

        let registry =
            FakeRegistry::with_changes(3, vec![("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]);
        let remote = registry.info;

        SyncExecutor::new(
            &registry,
            &mut store,
            &NoopObserver,
            CancelToken::new(),
            FeedOptions::default(),
        )
        .run_incremental(&remote)
        .await
        .unwrap();
        assert_eq!(store.load().unwrap().names, set(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_premature_close_commits_partial_merge() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save(BTreeSet::new(), 0).unwrap();

        let registry = FakeRegistry::with_changes(30, (1..=30).map(|i| (format!("p{}", i), i)))
            .closing_at(20);
        let remote = registry.info;

        let report = SyncExecutor::new(
            &registry,
            &mut store,
            &NoopObserver,
            CancelToken::new(),
            FeedOptions { page_size: 10, concurrency: 1 },
        )
        .run_incremental(&remote)
        .await
        .unwrap();

        assert!(report.closed_early);
        assert_eq!(report.sequence, 20);
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.names.len(), 20);
        assert_eq!(snapshot.sequence, Some(20));
    }

    #[tokio::test]
    async fn test_network_failure_leaves_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save(set(&["lodash"]), 2).unwrap();

        let registry = FakeRegistry::with_changes(10, (3..=10).map(|i| (format!("p{}", i), i)))
            .failing_with(|| NameCheckError::HttpStatus { url: "changes".into(), status: 503 });
        let remote = registry.info;

        let err = SyncExecutor::new(
            &registry,
            &mut store,
            &NoopObserver,
            CancelToken::new(),
            FeedOptions::default(),
        )
        .run_incremental(&remote)
        .await
        .unwrap_err();
        assert!(err.is_transient());

        let mut reopened = SnapshotStore::open(dir.path()).unwrap();
        let snapshot = reopened.load().unwrap();
        assert_eq!(snapshot.names, set(&["lodash"]));
        assert_eq!(snapshot.sequence, Some(2));
    }

    #[tokio::test]
    async fn test_cancelled_full_refresh_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = SnapshotStore::open(dir.path()).unwrap();
        store.save(set(&["lodash"]), 2).unwrap();

        let registry = FakeRegistry::new(10, 2).with_names(&["a", "b"]);
        let remote = registry.info;
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = SyncExecutor::new(
            &registry,
            &mut store,
            &NoopObserver,
            cancel,
            FeedOptions::default(),
        )
        .run_full(&remote)
        .await;
        assert!(matches!(result, Err(NameCheckError::Cancelled)));
        assert_eq!(store.load().unwrap().names, set(&["lodash"]));
    }
}
