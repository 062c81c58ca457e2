//! Progress and status reporting.
//!
//! The engine never owns a UI. Callers inject a [`ProgressObserver`]; the
//! engine calls it inline from the comparison loop, so implementations must
//! return quickly.

use std::sync::Mutex;

use log::{debug, info};

pub trait ProgressObserver: Send + Sync {
    /// Percentage in `0..=100`.
    fn on_progress(&self, _percent: u8) {}

    fn on_status(&self, _message: &str) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Forwards events to the `log` facade: status at info, progress at debug.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_progress(&self, percent: u8) {
        debug!("Progress {percent}%");
    }

    fn on_status(&self, message: &str) {
        info!("{message}");
    }
}

/// Keeps every event, in order. Useful for asserting what a run reported.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    progress: Mutex<Vec<u8>>,
    statuses: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, percent: u8) {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(percent);
    }

    fn on_status(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

/// Filters a stream of percentages down to whole-point increases.
#[derive(Debug, Default)]
pub struct PercentTracker {
    last: Option<u8>,
}

impl PercentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `percent` (clamped to 100) if it is above the last value reported.
    pub fn report(&mut self, percent: usize, observer: &dyn ProgressObserver) {
        let percent = percent.min(100) as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        observer.on_progress(percent);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// `done / total` as a whole percentage; an empty job counts as finished.
pub fn percent_of(done: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        done.saturating_mul(100) / total
    }
}
