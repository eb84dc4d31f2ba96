//! Terminal progress bars for snapshot syncs.

use crate::sync::{SyncEvent, SyncObserver, SyncPlan};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::sync::Mutex;

const BYTES_TEMPLATE: &str =
    "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";
const RECORDS_TEMPLATE: &str =
    "{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Draws sync progress on stderr.
pub struct ProgressObserver {
    enabled: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressObserver {
    /// A disabled observer swallows every event.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            bar: Mutex::new(None),
        }
    }

    fn start(&self, total: u64, template: &str, message: &str) {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(message.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn update(&self, position: u64, total: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                if bar.length().is_some_and(|len| total > len) {
                    bar.set_length(total);
                }
                bar.set_position(position);
            }
        }
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl SyncObserver for ProgressObserver {
    fn on_event(&self, event: &SyncEvent) {
        if !self.enabled {
            return;
        }

        match event {
            SyncEvent::Planned { plan: SyncPlan::FullRefresh, .. } => {
                eprintln!(
                    "Downloading all names from the npm registry. Subsequent runs fetch only updates."
                );
            }
            SyncEvent::Planned { plan: SyncPlan::IncrementalUpdate, missing } => {
                eprintln!("Fetching updates from the npm registry ({} sequences behind).", missing);
            }
            SyncEvent::DownloadStarted { estimated_bytes } => {
                let message = format!("apprx. {}", HumanBytes(*estimated_bytes));
                self.start(*estimated_bytes, BYTES_TEMPLATE, &message);
            }
            SyncEvent::Download(progress) => {
                self.update(progress.received_bytes, progress.total_bytes);
            }
            SyncEvent::ChangesStarted { since, target } => {
                let total = target.saturating_sub(since.unwrap_or(0));
                self.start(total, RECORDS_TEMPLATE, "changes");
            }
            SyncEvent::ChangeApplied { applied, expected } => {
                self.update(*applied, (*expected).max(*applied));
            }
            SyncEvent::DownloadComplete { .. } | SyncEvent::ChangesComplete { .. } => {
                self.finish();
            }
            _ => {}
        }
    }
}
