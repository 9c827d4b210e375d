// Metadata fetcher: one JSON request per service link, drained in order

use crate::errors::{describe_error, response_error};
use crate::metadata::{render_metadata, render_spatial_reference};
use crate::model::{FieldDescriptor, FieldType, fields_of};
use crate::outcome::{LoadingGuard, ProbeOutput, QueueReport, transport_failure};
use crate::panel::{Anchor, Panel, PanelItem, PanelKind};
use crate::query::{count_query_url, fetch_count, not_null_clause, read_count};
use arcprobe_scanner::links::is_feature_server;
use arcprobe_scanner::status::StatusCallback;
use arcprobe_scanner::transport::json_url;
use arcprobe_scanner::{ProbeQueue, ProbeTask, Result, ServiceLink, Transport};
use serde_json::Value;
use tracing::{debug, info};

pub const METADATA_QUEUE: &str = "metadata";

/// Drains service links, attaching spatial reference, metadata and
/// optionally feature count panels to each link.
pub struct MetadataFetcher<'a> {
    transport: &'a dyn Transport,
    count_features: bool,
    panels: Vec<Panel>,
}

impl<'a> MetadataFetcher<'a> {
    pub fn new(transport: &'a dyn Transport, count_features: bool) -> Self {
        Self {
            transport,
            count_features,
            panels: Vec::new(),
        }
    }

    pub fn into_panels(self) -> Vec<Panel> {
        self.panels
    }
}

impl ProbeTask<ServiceLink> for MetadataFetcher<'_> {
    async fn probe(&mut self, link: ServiceLink) -> Result<()> {
        let anchor = Anchor::Link {
            index: link.index,
            url: link.url.clone(),
        };

        let response = match fetch_document(self.transport, &link.url).await {
            Ok(response) => response,
            Err(e) => {
                self.panels.push(
                    Panel::new(anchor, PanelKind::Metadata).with_items(vec![transport_failure(&e)]),
                );
                return Err(e);
            }
        };

        if let Some(items) = render_spatial_reference(&response) {
            self.panels
                .push(Panel::new(anchor.clone(), PanelKind::SpatialReference).with_items(items));
        }
        if let Some(items) = render_metadata(&response) {
            self.panels
                .push(Panel::new(anchor.clone(), PanelKind::Metadata).with_items(items));
        }

        let fields = fields_of(&response);
        if self.count_features && !fields.is_empty() {
            let mut panel = Panel::new(anchor, PanelKind::FeatureCounts);
            let result = count_features(
                self.transport,
                &link.url,
                &response,
                &fields,
                &mut panel.items,
            )
            .await;
            if let Err(ref e) = result {
                panel.push(transport_failure(e));
            }
            self.panels.push(panel);
            result?;
        }

        Ok(())
    }
}

async fn fetch_document(transport: &dyn Transport, resource: &str) -> Result<Value> {
    let url = json_url(resource)?;
    transport.get_json(&url).await
}

/// Count features through the object id field and features with a shape.
///
/// Both count queries run one after the other.
pub async fn count_features(
    transport: &dyn Transport,
    layer_url: &str,
    doc: &Value,
    fields: &[FieldDescriptor],
    items: &mut Vec<PanelItem>,
) -> Result<()> {
    let (oid, shape) = count_fields(doc, fields);

    match oid {
        Some(oid) => {
            let url = count_query_url(layer_url, &not_null_clause(&oid))?;
            let (response, _) = fetch_count(transport, &url).await?;
            if let Some(count) = read_count(&response) {
                items.push(PanelItem::count("Number of features", count));
            }
            if let Some(error) = response_error(&response) {
                items.push(describe_error(error, Some(&FieldType::Oid)));
            }
        }
        None => items.push(PanelItem::label("No way to query features.")),
    }

    match shape {
        Some(shape) => {
            let url = count_query_url(layer_url, &not_null_clause(&shape))?;
            let (response, _) = fetch_count(transport, &url).await?;
            if let Some(count) = read_count(&response) {
                items.push(PanelItem::count("Features with shapes", count));
            }
            if let Some(error) = response_error(&response) {
                items.push(describe_error(error, Some(&FieldType::Geometry)));
            }
        }
        None => {
            let layer_type = doc.get("type").and_then(Value::as_str);
            if !is_feature_server(layer_url) && layer_type.is_some_and(|t| t != "Table") {
                items.push(PanelItem::label("No visible shape field available."));
            }
        }
    }

    Ok(())
}

/// Object id and shape field names used for counting.
fn count_fields(doc: &Value, fields: &[FieldDescriptor]) -> (Option<String>, Option<String>) {
    let mut oid = doc
        .get("objectIdField")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let mut shape = None;

    for field in fields {
        match field.field_type {
            FieldType::Oid | FieldType::Unknown => oid = Some(field.name.clone()),
            FieldType::Geometry => shape = Some(field.name.clone()),
            _ => {}
        }
        if oid.is_some() && shape.is_some() {
            break;
        }
    }

    (oid, shape)
}

/// Fetch metadata for every link, one request at a time.
pub async fn collect_metadata(
    transport: &dyn Transport,
    links: Vec<ServiceLink>,
    count_features: bool,
    status: &Option<StatusCallback>,
) -> ProbeOutput {
    if links.is_empty() {
        return ProbeOutput::default();
    }
    let _loading = LoadingGuard::start(status);
    info!("Collecting metadata for {} service link(s)", links.len());

    let mut queue = ProbeQueue::new(METADATA_QUEUE, links);
    let mut fetcher = MetadataFetcher::new(transport, count_features);
    let outcome = queue.drain(&mut fetcher).await;
    debug!("metadata queue finished: {:?}", queue.state());

    ProbeOutput {
        panels: fetcher.into_panels(),
        queues: vec![QueueReport::from_outcome(METADATA_QUEUE, &outcome)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_fields_prefers_oid_typed_field() {
        let doc = json!({
            "objectIdField": "OBJECTID",
            "fields": [
                {"name": "FID", "type": "esriFieldTypeOID"},
                {"name": "SHAPE", "type": "esriFieldTypeGeometry"},
                {"name": "NAME", "type": "esriFieldTypeString"}
            ]
        });
        let fields = fields_of(&doc);
        let (oid, shape) = count_fields(&doc, &fields);
        assert_eq!(oid.as_deref(), Some("FID"));
        assert_eq!(shape.as_deref(), Some("SHAPE"));
    }

    #[test]
    fn test_count_fields_falls_back_to_object_id_field() {
        let doc = json!({
            "objectIdField": "OBJECTID",
            "fields": [{"name": "NAME", "type": "esriFieldTypeString"}]
        });
        let fields = fields_of(&doc);
        assert_eq!(
            count_fields(&doc, &fields),
            (Some("OBJECTID".to_string()), None)
        );
    }
}
