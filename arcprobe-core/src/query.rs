// Query URLs for count and distinct-value requests

use crate::model::DomainProbe;
use arcprobe_scanner::links::strip_query;
use arcprobe_scanner::{Result, Transport};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

pub fn not_null_clause(field: &str) -> String {
    format!("{} IS NOT NULL", field)
}

pub fn not_empty_clause(field: &str) -> String {
    format!("{0} IS NOT NULL AND {0} <> ''", field)
}

pub fn equals_clause(probe: &DomainProbe) -> String {
    format!("{} = {}", probe.field_name, probe.literal())
}

/// `<layer>/query` with the given where clause, asking for a count only.
pub fn count_query_url(layer_url: &str, where_clause: &str) -> Result<Url> {
    let mut url = query_endpoint(layer_url)?;
    url.query_pairs_mut()
        .append_pair("where", where_clause)
        .append_pair("returnGeometry", "false")
        .append_pair("returnCountOnly", "true")
        .append_pair("f", "json");
    Ok(url)
}

/// `<service>/<layer>/query` returning the distinct values of one field.
pub fn distinct_values_url(service_url: &str, layer_id: i64, field: &str) -> Result<Url> {
    let layer_url = format!("{}/{}", strip_query(service_url).trim_end_matches('/'), layer_id);
    let mut url = query_endpoint(&layer_url)?;
    url.query_pairs_mut()
        .append_pair("where", "1=1")
        .append_pair("returnGeometry", "false")
        .append_pair("outFields", field)
        .append_pair("orderByFields", field)
        .append_pair("returnDistinctValues", "true")
        .append_pair("f", "json");
    Ok(url)
}

fn query_endpoint(layer_url: &str) -> Result<Url> {
    let base = strip_query(layer_url).trim_end_matches('/');
    Ok(Url::parse(&format!("{}/query", base))?)
}

/// The `count` of a count-only response.
pub fn read_count(response: &Value) -> Option<u64> {
    let count = response.get("count")?;
    count
        .as_u64()
        .or_else(|| count.as_f64().filter(|c| *c >= 0.0).map(|c| c as u64))
}

/// Issue one count query and time the round trip.
pub async fn fetch_count(transport: &dyn Transport, url: &Url) -> Result<(Value, Duration)> {
    let start = Instant::now();
    let response = transport.get_json(url).await?;
    let elapsed = start.elapsed();
    debug!("count query {} answered in {:?}", url, elapsed);
    Ok((response, elapsed))
}
