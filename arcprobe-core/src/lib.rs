pub mod domains;
pub mod errors;
pub mod fetcher;
pub mod fields;
pub mod gp;
pub mod helper;
pub mod metadata;
pub mod model;
pub mod outcome;
pub mod panel;
pub mod probe;
pub mod query;
pub mod report;
pub mod search;
pub mod settings;
pub mod status;

pub use outcome::{ProbeOutput, QueueReport};
pub use panel::{Anchor, ItemFlag, Panel, PanelItem, PanelKind};
pub use probe::PageProbe;
pub use report::{ProbeReport, ReportFormat};
pub use search::{SearchReport, SearchTerm, ServiceSearch};
pub use settings::{Settings, SettingsError};
pub use status::StatusIndicator;
