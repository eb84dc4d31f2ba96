//! Progress events emitted while refreshing the snapshot.
//!
//! The core never renders anything. Presentation code implements
//! [`SyncObserver`] to draw progress bars or log lines.

use crate::registry::DownloadProgress;
use crate::sync::planner::SyncPlan;
use crate::types::RemoteInfo;

/// Events emitted during a sync.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SyncEvent {
    /// Registry summary is known.
    RemoteInfo(RemoteInfo),

    /// The planner picked a strategy.
    Planned {
        plan: SyncPlan,
        /// Sequence numbers the snapshot is behind by.
        missing: u64,
    },

    /// Starting a full listing download.
    DownloadStarted {
        /// Estimated size in bytes.
        estimated_bytes: u64,
    },

    /// Bytes received during a full download.
    Download(DownloadProgress),

    /// Full listing downloaded and parsed.
    DownloadComplete {
        /// Names in the listing.
        names: usize,
    },

    /// Starting to replay changes.
    ChangesStarted {
        since: Option<u64>,
        target: u64,
    },

    /// One change record merged.
    ChangeApplied {
        /// Records applied so far.
        applied: u64,
        /// Sequence numbers to cover in total.
        expected: u64,
    },

    /// Change replay finished.
    ChangesComplete {
        applied: u64,
        sequence: u64,
        /// True when the feed connection closed before the target.
        closed_early: bool,
    },

    /// Snapshot written to disk.
    Saved {
        names: usize,
        sequence: u64,
    },
}

/// Receives [`SyncEvent`]s.
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_event(&self, _event: &SyncEvent) {}
}
