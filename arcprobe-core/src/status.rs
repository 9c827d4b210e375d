// Loading indicator driven by queue status signals

use arcprobe_scanner::status::{StatusCallback, StatusSignal};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Observer of `StatusSignal`s.
///
/// Holds a single loading flag: repeated starts or completes leave it where it
/// is, so the concurrent queues of one run can all report to the same
/// indicator.
pub struct StatusIndicator {
    loading: AtomicBool,
    spinner: ProgressBar,
}

impl StatusIndicator {
    pub fn new(show: bool) -> Self {
        let spinner = if show {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            loading: AtomicBool::new(false),
            spinner,
        }
    }

    /// Apply a signal. Returns true when the loading flag changed.
    pub fn apply(&self, signal: StatusSignal) -> bool {
        let loading = signal == StatusSignal::LoadingStart;
        let changed = self.loading.swap(loading, Ordering::SeqCst) != loading;
        debug!("status {} (changed: {})", signal, changed);

        if changed {
            if loading {
                self.spinner.set_message("Querying service...");
                self.spinner.enable_steady_tick(Duration::from_millis(100));
            } else {
                self.spinner.disable_steady_tick();
                self.spinner.set_message("Idle");
            }
        }
        changed
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn callback(self: &Arc<Self>) -> StatusCallback {
        let indicator = Arc::clone(self);
        Arc::new(move |signal| {
            indicator.apply(signal);
        })
    }

    pub fn finish(&self) {
        self.loading.store(false, Ordering::SeqCst);
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_signals_are_idempotent() {
        let indicator = StatusIndicator::new(false);

        assert!(indicator.apply(StatusSignal::LoadingStart));
        assert!(!indicator.apply(StatusSignal::LoadingStart));
        assert!(indicator.is_loading());

        assert!(indicator.apply(StatusSignal::LoadingComplete));
        assert!(!indicator.apply(StatusSignal::LoadingComplete));
        assert!(!indicator.is_loading());
    }

    #[test]
    fn test_callback_forwards_to_indicator() {
        let indicator = Arc::new(StatusIndicator::new(false));
        let callback = indicator.callback();

        callback(StatusSignal::LoadingStart);
        assert!(indicator.is_loading());
        callback(StatusSignal::LoadingComplete);
        assert!(!indicator.is_loading());
    }
}
