// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    ProbeOverrides, build_query_form, load_urls_from_file, load_urls_from_source,
    parse_assignment, parse_statistic, parse_url_line, render_reports, resolve_token,
    split_layer_url,
};
