//! Structured logger with per-repository summary collection.
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{Log, RepoEntry, RepoStatus};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger backed by [`tracing`].
///
/// Messages are emitted as tracing events and rendered by the subscriber
/// installed with [`init_subscriber`](super::init_subscriber). When no
/// subscriber is installed (unit tests) the events are dropped, but the
/// warning counter and the repository summary still work.
#[derive(Debug, Default)]
pub struct Logger {
    entries: Mutex<Vec<RepoEntry>>,
    warnings: AtomicUsize,
}

impl Logger {
    /// Create a new logger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "volt::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record a repository outcome for the summary.
    pub fn record(&self, name: &str, status: RepoStatus, message: Option<&str>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RepoEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
    }

    /// Number of warnings logged so far.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Return a copy of every recorded repository outcome.
    #[must_use]
    pub fn entries(&self) -> Vec<RepoEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn count(&self, status: RepoStatus) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.status == status)
            .count()
    }

    /// Log one line per changed repository followed by the totals.
    ///
    /// Unchanged repositories only appear in the totals; listing them would
    /// drown the interesting lines on large profiles.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        self.stage("Summary");
        for entry in entries.iter().filter(|e| e.status != RepoStatus::Unchanged) {
            let verb = match entry.status {
                RepoStatus::Added => "added",
                RepoStatus::Updated => "updated",
                RepoStatus::Removed => "removed",
                RepoStatus::Unchanged => "unchanged",
                RepoStatus::Failed => "failed",
            };
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            self.info(&format!("{verb}: {}{suffix}", entry.name));
        }

        self.info(&format!(
            "{} added, {} updated, {} removed, {} unchanged, {} failed",
            self.count(RepoStatus::Added),
            self.count(RepoStatus::Updated),
            self.count(RepoStatus::Removed),
            self.count(RepoStatus::Unchanged),
            self.count(RepoStatus::Failed),
        ));
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record(&self, name: &str, status: RepoStatus, message: Option<&str>) {
        self.record(name, status, message);
    }
}
