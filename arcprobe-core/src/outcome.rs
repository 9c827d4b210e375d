// Summaries of drained probe queues

use crate::panel::{ItemFlag, Panel, PanelItem};
use arcprobe_scanner::status::{StatusCallback, StatusSignal, emit};
use arcprobe_scanner::{ProbeError, QueueOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How one queue ended, as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueReport {
    pub label: String,
    pub processed: usize,
    pub remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueReport {
    pub fn from_outcome(label: &str, outcome: &QueueOutcome) -> Self {
        match outcome {
            QueueOutcome::Drained { processed } => Self {
                label: label.to_string(),
                processed: *processed,
                remaining: 0,
                error: None,
            },
            QueueOutcome::Errored {
                processed,
                remaining,
                error,
            } => Self {
                label: label.to_string(),
                processed: *processed,
                remaining: *remaining,
                error: Some(error.to_string()),
            },
        }
    }

    /// A queue that never started because its input could not be fetched.
    pub fn failed(label: &str, error: &ProbeError) -> Self {
        Self {
            label: label.to_string(),
            processed: 0,
            remaining: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for QueueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "{}: drained, {} processed", self.label, self.processed),
            Some(error) => write!(
                f,
                "{}: errored after {} processed, {} never dispatched ({})",
                self.label, self.processed, self.remaining, error
            ),
        }
    }
}

/// Panels produced by one queue plus how the queue ended.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutput {
    pub panels: Vec<Panel>,
    pub queues: Vec<QueueReport>,
}

impl ProbeOutput {
    pub fn extend(&mut self, other: ProbeOutput) {
        self.panels.extend(other.panels);
        self.queues.extend(other.queues);
    }
}

/// The line shown on a panel whose request never completed.
pub fn transport_failure(error: &ProbeError) -> PanelItem {
    PanelItem::entry("Request failed", error.to_string()).with_flag(ItemFlag::Error)
}

/// Brackets a queue run with loading signals.
pub(crate) struct LoadingGuard<'a> {
    status: &'a Option<StatusCallback>,
}

impl<'a> LoadingGuard<'a> {
    pub(crate) fn start(status: &'a Option<StatusCallback>) -> Self {
        emit(status, StatusSignal::LoadingStart);
        Self { status }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        emit(self.status, StatusSignal::LoadingComplete);
    }
}
