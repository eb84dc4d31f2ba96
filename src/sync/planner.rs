//! Chooses how to bring the snapshot up to date.

use crate::types::{RemoteInfo, Snapshot};
use serde::Serialize;

/// Replaying this many change records costs about as much as downloading
/// one listing row.
pub const DEFAULT_CHANGE_COST_RATIO: u64 = 6;

/// Refresh strategy.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum SyncPlan {
    /// Download the whole listing again.
    FullRefresh,
    /// Replay changes since the snapshot's sequence.
    IncrementalUpdate,
    /// Snapshot is fresh enough.
    NoOp,
}

/// Pure decision over already fetched local and remote state.
#[derive(Debug, Clone, Copy)]
pub struct SyncPlanner {
    change_cost_ratio: u64,
}

impl SyncPlanner {
    pub fn new(change_cost_ratio: u64) -> Self {
        Self {
            change_cost_ratio: change_cost_ratio.max(1),
        }
    }

    /// Sequence numbers the snapshot is behind the registry by.
    pub fn missing(local: &Snapshot, remote: &RemoteInfo) -> u64 {
        remote
            .update_seq
            .saturating_sub(local.sequence.unwrap_or(0))
    }

    /// Pick a strategy.
    ///
    /// A fresh snapshot needs nothing. Otherwise the change replay cost,
    /// rounded up to whole listing rows, is compared with the size of the
    /// listing; on a tie the full download wins.
    pub fn decide(&self, local: &Snapshot, stale: bool, remote: &RemoteInfo) -> SyncPlan {
        if !stale {
            return SyncPlan::NoOp;
        }

        let missing = Self::missing(local, remote);
        if missing.div_ceil(self.change_cost_ratio) >= remote.doc_count {
            SyncPlan::FullRefresh
        } else {
            SyncPlan::IncrementalUpdate
        }
    }
}

impl Default for SyncPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_COST_RATIO)
    }
}
