// Report generation from a finished page probe

use crate::outcome::QueueReport;
use crate::panel::{Anchor, ItemFlag, Panel, PanelItem};
use arcprobe_scanner::ServiceLink;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";
const THIN_RULE: &str = "────────────────────────────────────────────────────────────────────────────────\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Everything learned about one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub page_url: String,
    pub generated_at: DateTime<Utc>,
    pub links: Vec<ServiceLink>,
    pub panels: Vec<Panel>,
    pub queues: Vec<QueueReport>,
    /// Comma separated leaf layer ids, for find pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find_layers: Option<String>,
}

impl ProbeReport {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            generated_at: Utc::now(),
            links: Vec::new(),
            panels: Vec::new(),
            queues: Vec::new(),
            find_layers: None,
        }
    }

    /// Panels attached to `anchor`, in arrival order.
    pub fn panels_for<'a>(&'a self, anchor: &'a Anchor) -> impl Iterator<Item = &'a Panel> + 'a {
        self.panels.iter().filter(move |panel| &panel.anchor == anchor)
    }

    /// Distinct anchors in first-seen order.
    pub fn anchors(&self) -> Vec<&Anchor> {
        let mut anchors: Vec<&Anchor> = Vec::new();
        for panel in &self.panels {
            if !anchors.contains(&&panel.anchor) {
                anchors.push(&panel.anchor);
            }
        }
        anchors
    }

    pub fn error_count(&self) -> usize {
        self.panels.iter().filter(|panel| panel.has_errors()).count()
    }

    pub fn has_stalled_queue(&self) -> bool {
        self.queues.iter().any(QueueReport::is_errored)
    }
}

pub fn generate_text_report(report: &ProbeReport, expand: bool) -> String {
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str(&format!("{}\n", "                          ARCPROBE SERVICE REPORT".bold()));
    out.push_str(RULE);
    out.push('\n');

    out.push_str(&format!("Page:         {}\n", report.page_url));
    out.push_str(&format!(
        "Generated:    {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Service links: {}\n", report.links.len()));
    if let Some(ref layers) = report.find_layers {
        out.push_str(&format!("Find layers:  {}\n", layers));
    }
    out.push('\n');

    for anchor in report.anchors() {
        out.push_str(&format!("{}\n", anchor.to_string().bright_white().bold()));
        for panel in report.panels_for(anchor) {
            push_panel(&mut out, panel, expand);
        }
        out.push_str(THIN_RULE);
    }

    if !report.queues.is_empty() {
        out.push('\n');
        out.push_str("Queues:\n");
        for queue in &report.queues {
            let line = queue.to_string();
            if queue.is_errored() {
                out.push_str(&format!("  {}\n", line.red()));
            } else {
                out.push_str(&format!("  {}\n", line));
            }
        }
    }

    out.push('\n');
    out.push_str(RULE);
    out.push_str("\nGenerated by arcprobe\n");

    out
}

fn push_panel(out: &mut String, panel: &Panel, expand: bool) {
    let title = panel.kind.title().cyan();
    if panel.collapsed && !expand {
        let errors = if panel.has_errors() {
            format!(", {}", "errors".red())
        } else {
            String::new()
        };
        out.push_str(&format!(
            "  [+] {} ({} item(s){})\n",
            title,
            panel.items.len(),
            errors
        ));
        return;
    }

    out.push_str(&format!("  [-] {}\n", title));
    for item in &panel.items {
        push_item(out, item, 2);
    }
}

fn push_item(out: &mut String, item: &PanelItem, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = item.text();
    if let Some(ms) = item.elapsed_ms {
        line.push_str(&format!(" ({} ms)", ms));
    }

    let line = match item.flag {
        ItemFlag::Normal => line.normal(),
        ItemFlag::Error => line.red(),
        ItemFlag::Empty => format!("{} !!!", line).yellow(),
    };
    out.push_str(&format!("{}{}\n", indent, line));

    if let Some(ref link) = item.link {
        out.push_str(&format!("{}  {}\n", indent, link.dimmed()));
    }
    for child in &item.children {
        push_item(out, child, depth + 1);
    }
}

pub fn generate_json_report(report: &ProbeReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&report_json(report))
}

/// Several pages in one document, for runs over a pages file.
pub fn generate_json_reports(reports: &[ProbeReport]) -> Result<String, serde_json::Error> {
    let reports: Vec<Value> = reports.iter().map(report_json).collect();
    serde_json::to_string_pretty(&reports)
}

fn report_json(report: &ProbeReport) -> Value {
    serde_json::json!({
        "report": {
            "metadata": {
                "generator": "arcprobe",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": report.generated_at.to_rfc3339(),
                "format": "json"
            },
            "page": report.page_url,
            "links": report.links,
            "panels": report.panels,
            "queues": report.queues,
            "find_layers": report.find_layers,
        }
    })
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
