//! Ordered, bounded-concurrency reader over the registry change feed.
//!
//! The range `(since, target]` is cut into windows of `page_size` sequence
//! numbers. Sequence numbers are unique, so one `limit = page_size` request
//! returns every change inside a window; anything past the window end is
//! dropped and picked up by the next window. Windows are fetched in parallel
//! but handed out strictly in order.

use crate::cancel::CancelToken;
use crate::registry::Registry;
use crate::types::{ChangeRecord, NameCheckError, Result};
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

/// Tunables for following the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Sequence numbers covered by one request.
    pub page_size: usize,
    /// Requests in flight at once.
    pub concurrency: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            page_size: 1000,
            concurrency: 5,
        }
    }
}

/// A fetched window, clipped to its bounds.
struct Window {
    end: u64,
    records: Vec<ChangeRecord>,
}

/// Lazy, finite producer of change records in increasing sequence order.
///
/// The target is fixed when the feed is created, so the feed always ends.
pub struct ChangeFeed<'a> {
    windows: BoxStream<'a, Result<Window>>,
    buffered: std::vec::IntoIter<ChangeRecord>,
    buffered_end: u64,
    position: u64,
    last_yielded: Option<u64>,
    finished: bool,
    closed_early: bool,
}

impl<'a> ChangeFeed<'a> {
    /// Follow changes after `since` up to and including `target`.
    pub fn new<R>(registry: &'a R, since: u64, target: u64, options: FeedOptions) -> Self
    where
        R: Registry + ?Sized,
    {
        let page_size = options.page_size.max(1);
        let bounds = window_bounds(since, target, page_size as u64);
        debug!(
            "Following changes {}..={} in {} windows",
            since,
            target,
            bounds.len()
        );

        let windows = stream::iter(bounds)
            .map(move |(start, end)| async move {
                let records = registry.fetch_changes(start, page_size).await?;
                Ok(Window {
                    end,
                    records: clip(records, start, end),
                })
            })
            .buffered(options.concurrency.max(1))
            .boxed();

        Self {
            windows,
            buffered: Vec::new().into_iter(),
            buffered_end: since,
            position: since,
            last_yielded: None,
            finished: false,
            closed_early: false,
        }
    }

    /// Next record, or `None` once the target is reached or the connection
    /// closed early.
    pub async fn next_record(&mut self) -> Result<Option<ChangeRecord>> {
        loop {
            if let Some(record) = self.buffered.next() {
                if self.last_yielded.is_some_and(|last| record.sequence_after <= last) {
                    warn!("Skipping out-of-order change {:?}", record);
                    continue;
                }
                self.last_yielded = Some(record.sequence_after);
                return Ok(Some(record));
            }

            // Current window fully drained.
            self.position = self.buffered_end;
            if self.finished {
                return Ok(None);
            }

            match self.windows.next().await {
                None => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(Ok(window)) => {
                    self.buffered_end = window.end;
                    self.buffered = window.records.into_iter();
                }
                Some(Err(NameCheckError::StreamClosedEarly(reason))) => {
                    warn!(
                        "Change feed closed early at {}: {}",
                        self.position, reason
                    );
                    self.finished = true;
                    self.closed_early = true;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
            }
        }
    }

    /// Last sequence whose changes have all been handed out.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether the feed ended on a premature connection close.
    pub fn closed_early(&self) -> bool {
        self.closed_early
    }
}

/// How a call to [`follow_changes`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOutcome {
    /// Sequence every delivered change is accounted up to.
    pub sequence: u64,
    pub records: u64,
    pub closed_early: bool,
}

/// Replay changes after `since` (from the start when `None`), calling
/// `on_record` once per change in increasing sequence order.
///
/// The target is the registry's update sequence at call time.
pub async fn follow_changes<R, F>(
    registry: &R,
    since: Option<u64>,
    options: FeedOptions,
    cancel: &CancelToken,
    mut on_record: F,
) -> Result<FeedOutcome>
where
    R: Registry + ?Sized,
    F: FnMut(ChangeRecord),
{
    let target = registry.remote_info().await?.update_seq;
    let mut feed = ChangeFeed::new(registry, since.unwrap_or(0), target, options);
    let mut records = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(NameCheckError::Cancelled),
            next = feed.next_record() => next?,
        };
        match next {
            Some(record) => {
                records += 1;
                on_record(record);
            }
            None => break,
        }
    }

    Ok(FeedOutcome {
        sequence: feed.position(),
        records,
        closed_early: feed.closed_early(),
    })
}

fn window_bounds(since: u64, target: u64, size: u64) -> Vec<(u64, u64)> {
    let mut bounds = Vec::new();
    let mut start = since;
    while start < target {
        let end = start.saturating_add(size).min(target);
        bounds.push((start, end));
        start = end;
    }
    bounds
}

fn clip(mut records: Vec<ChangeRecord>, start: u64, end: u64) -> Vec<ChangeRecord> {
    records.retain(|r| r.sequence_after > start && r.sequence_after <= end);
    records.sort_by_key(|r| r.sequence_after);
    records
}
