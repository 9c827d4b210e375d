// One probe run over a services directory page

use crate::domains::{DomainField, check_domains};
use crate::fetcher::collect_metadata;
use crate::fields::{AnchoredField, check_for_nulls};
use crate::helper::{LayerEntry, fetch_layers, layer_ids_csv, queryable_fields};
use crate::model::indexed_fields_of;
use crate::outcome::{ProbeOutput, QueueReport, transport_failure};
use crate::panel::{Anchor, Panel, PanelItem, PanelKind};
use crate::report::ProbeReport;
use crate::settings::Settings;
use arcprobe_scanner::links::{
    field_list_labels, is_find_page, is_layer_page, scan_service_links, strip_find, strip_query,
};
use arcprobe_scanner::status::StatusCallback;
use arcprobe_scanner::transport::json_url;
use arcprobe_scanner::{ProbeError, Transport};
use tracing::{debug, info, warn};
use url::Url;

pub const PAGE_QUEUE: &str = "page";
pub const LAYER_QUEUE: &str = "layer";
pub const FIND_QUEUE: &str = "find-helper";

/// Runs every enabled prober against one page.
///
/// The metadata, null-check and domain queues are independent and run
/// concurrently; each of them stays strictly serial.
pub struct PageProbe<'a> {
    transport: &'a dyn Transport,
    settings: Settings,
    status: Option<StatusCallback>,
}

impl<'a> PageProbe<'a> {
    pub fn new(transport: &'a dyn Transport, settings: Settings) -> Self {
        Self {
            transport,
            settings,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCallback) -> Self {
        self.status = Some(status);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fetch the page at `page_url` and probe it.
    ///
    /// A page that cannot be fetched still yields a report, holding the
    /// failure and a failed `page` queue.
    pub async fn probe_page(&self, page_url: &str) -> ProbeReport {
        let html = match Url::parse(page_url) {
            Ok(url) => self.transport.get_page(&url).await,
            Err(e) => Err(e.into()),
        };

        match html {
            Ok(html) => self.run(page_url, &html).await,
            Err(e) => {
                let page = strip_query(page_url).trim_end_matches('/').to_string();
                let output = failed_output(PAGE_QUEUE, &page, PanelKind::Page, &e);
                let mut report = ProbeReport::new(page);
                report.panels = output.panels;
                report.queues = output.queues;
                report
            }
        }
    }

    /// Probe the page at `page_url`, whose HTML is `html`.
    pub async fn run(&self, page_url: &str, html: &str) -> ProbeReport {
        let page = strip_query(page_url).trim_end_matches('/').to_string();
        let links = scan_service_links(html, page_url);
        info!("{}: {} service link(s)", page, links.len());

        let metadata = async {
            if self.settings.auto_metadata {
                collect_metadata(
                    self.transport,
                    links.clone(),
                    self.settings.feature_counts_enabled(),
                    &self.status,
                )
                .await
            } else {
                debug!("Metadata disabled");
                ProbeOutput::default()
            }
        };
        let layer = async {
            if is_layer_page(&page) {
                self.probe_layer(&page, html).await
            } else {
                ProbeOutput::default()
            }
        };
        let find = async {
            if is_find_page(&page) {
                self.find_helper(&page).await
            } else {
                (ProbeOutput::default(), None)
            }
        };

        let (metadata, layer, (find, find_layers)) = tokio::join!(metadata, layer, find);

        let mut output = ProbeOutput::default();
        output.extend(metadata);
        output.extend(layer);
        output.extend(find);

        let mut report = ProbeReport::new(page);
        report.links = links;
        report.panels = output.panels;
        report.queues = output.queues;
        report.find_layers = find_layers;
        report
    }

    /// Field and domain counts of a layer page.
    async fn probe_layer(&self, layer_url: &str, html: &str) -> ProbeOutput {
        let settings = &self.settings;
        if !settings.auto_field_counts && !settings.auto_domain_counts {
            return ProbeOutput::default();
        }

        let doc = match json_url(layer_url) {
            Ok(url) => self.transport.get_json(&url).await,
            Err(e) => Err(e),
        };
        let doc = match doc {
            Ok(doc) => doc,
            Err(e) => return failed_output(LAYER_QUEUE, layer_url, PanelKind::FieldCounts, &e),
        };

        let fields = indexed_fields_of(&doc);
        if fields.is_empty() {
            debug!("{} has no fields", layer_url);
            return ProbeOutput::default();
        }

        let raw_count = doc
            .get("fields")
            .and_then(|fields| fields.as_array())
            .map_or(0, Vec::len);
        let labels = field_list_labels(html);
        if labels.as_ref().is_some_and(|labels| labels.len() != raw_count) {
            warn!("Field list of {} does not line up with its fields", layer_url);
        }
        let anchored = AnchoredField::pair(fields, labels.as_deref());
        let domain_fields = DomainField::from_fields(&anchored);

        let nulls = async {
            if settings.auto_field_counts {
                check_for_nulls(self.transport, layer_url, anchored, &self.status).await
            } else {
                ProbeOutput::default()
            }
        };
        let domains = async {
            if settings.auto_domain_counts {
                check_domains(self.transport, layer_url, domain_fields, &self.status).await
            } else {
                ProbeOutput::default()
            }
        };

        let (nulls, domains) = tokio::join!(nulls, domains);
        let mut output = nulls;
        output.extend(domains);
        output
    }

    /// Layer ids and queryable fields for a `find` page.
    async fn find_helper(&self, page: &str) -> (ProbeOutput, Option<String>) {
        let service = strip_find(page);
        match fetch_layers(self.transport, &service).await {
            Ok(layers) => {
                let ids = layer_ids_csv(&layers);
                let panel = Panel::new(Anchor::Page { url: page.to_string() }, PanelKind::FindHelper)
                    .with_items(find_helper_items(&layers, &ids));
                let output = ProbeOutput {
                    panels: vec![panel],
                    queues: Vec::new(),
                };
                (output, Some(ids))
            }
            Err(e) => (
                failed_output(FIND_QUEUE, page, PanelKind::FindHelper, &e),
                None,
            ),
        }
    }
}

fn find_helper_items(layers: &[LayerEntry], ids: &str) -> Vec<PanelItem> {
    let mut items = vec![PanelItem::entry("Layers", ids)];
    items.extend(layers.iter().map(|layer| {
        let fields = queryable_fields(&layer.fields)
            .into_iter()
            .map(|field| PanelItem::entry(&field.name, field.display_name()))
            .collect();
        PanelItem::sublist(format!("{} ({})", layer.name, layer.id), fields)
    }));
    items
}

/// A request that had to succeed before any queue could start.
fn failed_output(label: &str, page: &str, kind: PanelKind, error: &ProbeError) -> ProbeOutput {
    warn!("{}: {}", label, error);
    let panel = Panel::new(Anchor::Page { url: page.to_string() }, kind)
        .with_items(vec![transport_failure(error)]);
    ProbeOutput {
        panels: vec![panel],
        queues: vec![QueueReport::failed(label, error)],
    }
}
