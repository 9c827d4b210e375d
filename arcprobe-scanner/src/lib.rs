pub mod error;
pub mod links;
pub mod queue;
pub mod status;
pub mod transport;

pub use error::{ProbeError, Result};
pub use links::{ServiceLink, scan_service_links};
pub use queue::{ProbeQueue, ProbeTask, QueueOutcome, QueueState};
pub use status::{StatusCallback, StatusSignal};
pub use transport::{HttpTransport, Transport};
