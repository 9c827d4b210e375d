// Domain value checker: one equality count per coded value, field by field

use crate::errors::{describe_error, response_error};
use crate::fields::AnchoredField;
use crate::model::DomainProbe;
use crate::outcome::{LoadingGuard, ProbeOutput, QueueReport, transport_failure};
use crate::panel::{Anchor, Panel, PanelItem, PanelKind};
use crate::query::{count_query_url, equals_clause, fetch_count, read_count};
use arcprobe_scanner::status::StatusCallback;
use arcprobe_scanner::{ProbeQueue, ProbeTask, QueueOutcome, Result, Transport};
use tracing::{debug, info};

pub const DOMAIN_QUEUE: &str = "domains";

/// The coded values of one field, queued together.
#[derive(Debug, Clone)]
pub struct DomainField {
    pub anchor: Anchor,
    pub probes: Vec<DomainProbe>,
}

impl DomainField {
    /// Keep only fields with a coded-value domain; other anchors are dropped.
    pub fn from_fields(fields: &[AnchoredField]) -> Vec<DomainField> {
        fields
            .iter()
            .filter(|anchored| anchored.field.has_coded_domain())
            .map(|anchored| DomainField {
                anchor: anchored.anchor.clone(),
                probes: DomainProbe::for_field(&anchored.field),
            })
            .collect()
    }
}

/// Inner queue task: counts the features holding one code.
struct CodeCounter<'a> {
    transport: &'a dyn Transport,
    layer_url: &'a str,
    items: Vec<PanelItem>,
}

impl ProbeTask<DomainProbe> for CodeCounter<'_> {
    async fn probe(&mut self, probe: DomainProbe) -> Result<()> {
        let url = count_query_url(self.layer_url, &equals_clause(&probe))?;
        let (response, _) = fetch_count(self.transport, &url).await?;

        if let Some(count) = read_count(&response) {
            self.items.push(PanelItem::count(probe.name.clone(), count));
        } else if let Some(error) = response_error(&response) {
            self.items.push(describe_error(error, Some(&probe.field_type)));
        }
        Ok(())
    }
}

/// Outer queue task: drains the codes of one field before the next field starts.
pub struct DomainChecker<'a> {
    transport: &'a dyn Transport,
    layer_url: &'a str,
    panels: Vec<Panel>,
}

impl<'a> DomainChecker<'a> {
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
}

impl ProbeTask<DomainField> for DomainChecker<'_> {
    async fn probe(&mut self, field: DomainField) -> Result<()> {
        let label = field.anchor.to_string();
        let mut codes = ProbeQueue::new(label, field.probes);
        let mut counter = CodeCounter {
            transport: self.transport,
            layer_url: self.layer_url,
            items: Vec::new(),
        };

        let outcome = codes.drain(&mut counter).await;
        debug!("{}: {} code(s) counted", codes.label(), outcome.processed());

        let mut panel = Panel::new(field.anchor, PanelKind::DomainCounts).with_items(counter.items);
        match outcome {
            QueueOutcome::Drained { .. } => {
                self.panels.push(panel);
                Ok(())
            }
            QueueOutcome::Errored { error, .. } => {
                panel.push(transport_failure(&error));
                self.panels.push(panel);
                Err(error)
            }
        }
    }
}

/// Count every coded value of every domain field, strictly one query at a time.
pub async fn check_domains(
    transport: &dyn Transport,
    layer_url: &str,
    fields: Vec<DomainField>,
    status: &Option<StatusCallback>,
) -> ProbeOutput {
    if fields.is_empty() {
        return ProbeOutput::default();
    }
    let _loading = LoadingGuard::start(status);
    info!("Counting coded values of {} domain field(s)", fields.len());

    let mut queue = ProbeQueue::new(DOMAIN_QUEUE, fields);
    let mut checker = DomainChecker::new(transport, layer_url);
    let outcome = queue.drain(&mut checker).await;

    ProbeOutput {
        panels: checker.into_panels(),
        queues: vec![QueueReport::from_outcome(DOMAIN_QUEUE, &outcome)],
    }
}
