use crate::error::ProbeError;
use std::collections::VecDeque;
use std::future::Future;
use tracing::{debug, warn};

/// Where a probe queue stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Nothing in flight. Terminal once the queue is empty.
    Idle,
    /// Exactly one item has been dispatched and has not completed.
    AwaitingResponse,
    /// An item failed at the transport level. Nothing more is dispatched.
    Errored,
}

/// How a drained queue ended.
#[derive(Debug)]
pub enum QueueOutcome {
    Drained {
        processed: usize,
    },
    Errored {
        processed: usize,
        remaining: usize,
        error: ProbeError,
    },
}

impl QueueOutcome {
    pub fn processed(&self) -> usize {
        match self {
            QueueOutcome::Drained { processed } | QueueOutcome::Errored { processed, .. } => {
                *processed
            }
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, QueueOutcome::Errored { .. })
    }
}

/// One unit of work drained from a `ProbeQueue`.
///
/// `probe` resolves once every request belonging to the item has completed.
/// An `Err` means the transport failed and stops the queue.
pub trait ProbeTask<T> {
    fn probe(&mut self, item: T) -> impl Future<Output = Result<(), ProbeError>>;
}

/// Ordered work items consumed strictly from the front, one at a time.
#[derive(Debug)]
pub struct ProbeQueue<T> {
    items: VecDeque<T>,
    state: QueueState,
    dispatched: usize,
    label: String,
}

impl<T> ProbeQueue<T> {
    pub fn new(label: impl Into<String>, items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            state: QueueState::Idle,
            dispatched: 0,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Items not yet dispatched.
    pub fn pending(&self) -> usize {
        self.items.len()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn is_drained(&self) -> bool {
        self.state == QueueState::Idle && self.items.is_empty()
    }

    /// Append items discovered while the queue runs. They are dispatched
    /// after everything already queued.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        if self.state == QueueState::Errored {
            return;
        }
        self.items.extend(items);
    }

    /// Take the front item, if the queue is allowed to dispatch.
    ///
    /// Returns `None` while an item is in flight, after an error, or once
    /// the queue is empty.
    pub fn dispatch_next(&mut self) -> Option<T> {
        if self.state != QueueState::Idle {
            return None;
        }
        let item = self.items.pop_front()?;
        self.state = QueueState::AwaitingResponse;
        self.dispatched += 1;
        debug!(
            "[{}] dispatched item {} ({} pending)",
            self.label,
            self.dispatched,
            self.items.len()
        );
        Some(item)
    }

    /// The in-flight item received its response.
    pub fn complete(&mut self) {
        if self.state == QueueState::AwaitingResponse {
            self.state = QueueState::Idle;
        }
    }

    /// The in-flight item failed at the transport level.
    pub fn fail(&mut self, error: &ProbeError) {
        warn!(
            "[{}] stalled after item {}: {} ({} item(s) never dispatched)",
            self.label,
            self.dispatched,
            error,
            self.items.len()
        );
        self.state = QueueState::Errored;
    }

    /// Run every item through `task`, one after another.
    pub async fn drain<P>(&mut self, task: &mut P) -> QueueOutcome
    where
        P: ProbeTask<T>,
    {
        while let Some(item) = self.dispatch_next() {
            match task.probe(item).await {
                Ok(()) => self.complete(),
                Err(error) => {
                    self.fail(&error);
                    return QueueOutcome::Errored {
                        processed: self.dispatched - 1,
                        remaining: self.items.len(),
                        error,
                    };
                }
            }
        }

        debug!("[{}] drained after {} item(s)", self.label, self.dispatched);
        QueueOutcome::Drained {
            processed: self.dispatched,
        }
    }
}
