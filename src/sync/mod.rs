//! Snapshot synchronization.
//!
//! The planner decides between a full refresh, an incremental update or
//! nothing; the executor carries the decision out and reports progress
//! through a [`SyncObserver`].

pub mod executor;
pub mod planner;
pub mod progress;

pub use executor::{SyncExecutor, SyncReport};
pub use planner::{SyncPlan, SyncPlanner, DEFAULT_CHANGE_COST_RATIO};
pub use progress::{NoopObserver, SyncEvent, SyncObserver};
