use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Loading signal broadcast by the probe queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusSignal {
    LoadingStart,
    LoadingComplete,
}

impl StatusSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusSignal::LoadingStart => "loading-start",
            StatusSignal::LoadingComplete => "loading-complete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "loading-start" => Some(StatusSignal::LoadingStart),
            "loading-complete" => Some(StatusSignal::LoadingComplete),
            _ => None,
        }
    }
}

impl fmt::Display for StatusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of status signals. Delivery is not at-most-once.
pub type StatusCallback = Arc<dyn Fn(StatusSignal) + Send + Sync>;

/// Forward a signal when somebody listens.
pub fn emit(callback: &Option<StatusCallback>, signal: StatusSignal) {
    if let Some(callback) = callback {
        callback(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_signal_wire_names() {
        assert_eq!(StatusSignal::LoadingStart.as_str(), "loading-start");
        assert_eq!(StatusSignal::LoadingComplete.to_string(), "loading-complete");
        assert_eq!(
            StatusSignal::from_str("loading-complete"),
            Some(StatusSignal::LoadingComplete)
        );
        assert_eq!(StatusSignal::from_str("idle"), None);
        assert_eq!(
            serde_json::to_string(&StatusSignal::LoadingStart).unwrap(),
            "\"loading-start\""
        );
    }

    #[test]
    fn test_emit_reaches_callback() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let callback: Option<StatusCallback> = Some(Arc::new(move |signal| {
            sink.lock().unwrap().push(signal);
        }));

        emit(&callback, StatusSignal::LoadingStart);
        emit(&None, StatusSignal::LoadingStart);
        emit(&callback, StatusSignal::LoadingComplete);

        assert_eq!(
            *received.lock().unwrap(),
            vec![StatusSignal::LoadingStart, StatusSignal::LoadingComplete]
        );
    }
}
