// Field null-checker: counts non-null (and non-empty) values field by field

use crate::errors::{describe_error, response_error};
use crate::model::FieldDescriptor;
use crate::outcome::{LoadingGuard, ProbeOutput, QueueReport, transport_failure};
use crate::panel::{Anchor, Panel, PanelItem, PanelKind};
use crate::query::{count_query_url, fetch_count, not_empty_clause, not_null_clause, read_count};
use arcprobe_scanner::status::StatusCallback;
use arcprobe_scanner::{ProbeQueue, ProbeTask, Result, Transport};
use tracing::info;

pub const NULL_CHECK_QUEUE: &str = "null-check";

/// A field paired with the place its results are shown.
#[derive(Debug, Clone)]
pub struct AnchoredField {
    pub field: FieldDescriptor,
    pub anchor: Anchor,
}

impl AnchoredField {
    /// Pair fields with the labels of the page's field list. Each field
    /// carries its position in the layer's raw `fields` array, which is the
    /// position of its label. Missing labels fall back to the field name.
    pub fn pair(
        fields: Vec<(usize, FieldDescriptor)>,
        labels: Option<&[String]>,
    ) -> Vec<AnchoredField> {
        fields
            .into_iter()
            .map(|(i, field)| {
                let label = labels
                    .and_then(|labels| labels.get(i))
                    .cloned()
                    .unwrap_or_else(|| field.name.clone());
                AnchoredField {
                    anchor: Anchor::Field {
                        name: field.name.clone(),
                        label,
                    },
                    field,
                }
            })
            .collect()
    }
}

pub struct NullChecker<'a> {
    transport: &'a dyn Transport,
    layer_url: &'a str,
    panels: Vec<Panel>,
}

impl<'a> NullChecker<'a> {
    pub fn new(transport: &'a dyn Transport, layer_url: &'a str) -> Self {
        Self {
            transport,
            layer_url,
            panels: Vec::new(),
        }
    }

    pub fn into_panels(self) -> Vec<Panel> {
        self.panels
    }

    async fn count_field(&self, field: &FieldDescriptor, items: &mut Vec<PanelItem>) -> Result<()> {
        let url = count_query_url(self.layer_url, &not_null_clause(&field.name))?;
        let (response, elapsed) = fetch_count(self.transport, &url).await?;

        let error = response_error(&response);
        if let Some(count) = read_count(&response) {
            items.push(PanelItem::count("Features with values", count).with_elapsed(elapsed));
        } else if let Some(error) = error {
            items.push(describe_error(error, Some(&field.field_type)));
        }

        // Text columns may hold empty strings as well as nulls.
        if error.is_none() && field.field_type.is_string() {
            let url = count_query_url(self.layer_url, &not_empty_clause(&field.name))?;
            let (response, elapsed) = fetch_count(self.transport, &url).await?;
            if let Some(count) = read_count(&response) {
                items.push(
                    PanelItem::count("Features without empty values", count).with_elapsed(elapsed),
                );
            } else if let Some(error) = response_error(&response) {
                items.push(describe_error(error, None));
            }
        }

        Ok(())
    }
}

impl ProbeTask<AnchoredField> for NullChecker<'_> {
    async fn probe(&mut self, item: AnchoredField) -> Result<()> {
        let mut panel = Panel::new(item.anchor, PanelKind::FieldCounts);
        let result = self.count_field(&item.field, &mut panel.items).await;
        if let Err(ref e) = result {
            panel.push(transport_failure(e));
        }
        self.panels.push(panel);
        result
    }
}

/// Walk the fields of a layer, one field at a time.
pub async fn check_for_nulls(
    transport: &dyn Transport,
    layer_url: &str,
    fields: Vec<AnchoredField>,
    status: &Option<StatusCallback>,
) -> ProbeOutput {
    let _loading = LoadingGuard::start(status);
    info!("Checking {} field(s) of {} for nulls", fields.len(), layer_url);

    let mut queue = ProbeQueue::new(NULL_CHECK_QUEUE, fields);
    let mut checker = NullChecker::new(transport, layer_url);
    let outcome = queue.drain(&mut checker).await;

    ProbeOutput {
        panels: checker.into_panels(),
        queues: vec![QueueReport::from_outcome(NULL_CHECK_QUEUE, &outcome)],
    }
}
