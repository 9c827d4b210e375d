// Services directory search: walks folders, services, layers and tables one request at a time

use crate::outcome::{LoadingGuard, QueueReport};
use crate::panel::display_value;
use arcprobe_scanner::links::strip_query;
use arcprobe_scanner::status::StatusCallback;
use arcprobe_scanner::transport::json_url;
use arcprobe_scanner::{ProbeQueue, QueueOutcome, Result, Transport};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

pub const SEARCH_QUEUE: &str = "search";

/// Dotted paths checked in every response. Arrays along the way are walked.
pub const SEARCH_FIELDS: [&str; 15] = [
    "name",
    "description",
    "displayField",
    "fields.name",
    "fields.alias",
    "mapName",
    "layers.name",
    "documentInfo.Title",
    "documentInfo.Comments",
    "documentInfo.Subject",
    "documentInfo.Category",
    "documentInfo.Keywords",
    "folders",
    "services.name",
    "services.type",
];

static NUMBER_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d*\.?\d+$").expect("valid number pattern"));
static FOLDER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+/").expect("valid folder prefix pattern"));
static SERVICES_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\S*/rest/services/").expect("valid services root pattern"));

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Please enter a value to search for")]
    Empty,

    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// What a search looks for. Digits match numbers exactly; anything else is a
/// case-insensitive regular expression.
#[derive(Debug, Clone)]
pub enum SearchTerm {
    Number(f64),
    Pattern(Regex),
}

impl SearchTerm {
    pub fn parse(term: &str) -> std::result::Result<Self, SearchError> {
        if term.is_empty() {
            return Err(SearchError::Empty);
        }
        if NUMBER_TERM.is_match(term)
            && let Ok(number) = term.parse::<f64>()
        {
            return Ok(SearchTerm::Number(number));
        }
        let pattern = RegexBuilder::new(term).case_insensitive(true).build()?;
        Ok(SearchTerm::Pattern(pattern))
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            SearchTerm::Number(number) => value.as_f64() == Some(*number),
            SearchTerm::Pattern(pattern) => match value {
                Value::String(s) => pattern.is_match(s),
                Value::Number(n) => pattern.is_match(&n.to_string()),
                Value::Bool(b) => pattern.is_match(&b.to_string()),
                _ => false,
            },
        }
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTerm::Number(number) => write!(f, "{}", number),
            SearchTerm::Pattern(pattern) => f.write_str(pattern.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub field: String,
    pub value: String,
}

impl SearchHit {
    /// The hit's location relative to the services root.
    pub fn source(&self) -> String {
        SERVICES_ROOT.replace(&self.url, "./").into_owned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub root: String,
    pub term: String,
    /// Locations whose JSON was read.
    pub visited: usize,
    pub hits: Vec<SearchHit>,
    pub queue: QueueReport,
}

/// Every value found along a dotted path, with arrays flattened.
pub fn values_at<'a>(data: &'a Value, path: &[&str]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    collect_values(data, path, &mut out);
    out
}

fn collect_values<'a>(data: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    let Some(value) = data.get(*head).filter(|value| !value.is_null()) else {
        return;
    };

    match value {
        Value::Array(items) if rest.is_empty() => {
            out.extend(items.iter().filter(|item| !item.is_null()))
        }
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_values(item, rest, out)),
        _ if rest.is_empty() => out.push(value),
        _ => collect_values(value, rest, out),
    }
}

/// Hits for `term` in one response.
pub fn match_response(url: &str, data: &Value, term: &SearchTerm) -> Vec<SearchHit> {
    SEARCH_FIELDS
        .iter()
        .flat_map(|field| {
            let path: Vec<&str> = field.split('.').collect();
            values_at(data, &path)
                .into_iter()
                .filter(|value| term.matches(value))
                .map(|value| SearchHit {
                    url: url.to_string(),
                    field: field.to_string(),
                    value: display_value(value),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Locations below `url`: folders, then services, layers and tables.
pub fn child_urls(url: &str, data: &Value) -> Vec<String> {
    let list = |key: &str| {
        data.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    };
    let mut children = Vec::new();

    for folder in list("folders").iter().filter_map(Value::as_str) {
        children.push(format!("{}/{}", url, folder));
    }
    for service in list("services") {
        let name = service.get("name").map(display_value).unwrap_or_default();
        let service_type = service.get("type").map(display_value).unwrap_or_default();
        children.push(format!(
            "{}/{}/{}",
            url,
            FOLDER_PREFIX.replace_all(&name, ""),
            service_type
        ));
    }
    for key in ["layers", "tables"] {
        for item in list(key) {
            if let Some(id) = item.get("id").filter(|id| !id.is_null()) {
                children.push(format!("{}/{}", url, display_value(id)));
            }
        }
    }
    children
}

/// Crawls a services directory from a root URL, reading each location's
/// JSON in turn and queueing the locations it lists.
pub struct ServiceSearch<'a> {
    transport: &'a dyn Transport,
    status: Option<StatusCallback>,
}

impl<'a> ServiceSearch<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            status: None,
        }
    }

    pub fn with_status(mut self, status: StatusCallback) -> Self {
        self.status = Some(status);
        self
    }

    pub async fn run(&self, root_url: &str, term: &SearchTerm) -> SearchReport {
        let root = strip_query(root_url).trim_end_matches('/').to_string();
        let _loading = LoadingGuard::start(&self.status);
        let mut queue = ProbeQueue::new(SEARCH_QUEUE, [root.clone()]);
        let mut hits = Vec::new();

        let outcome = loop {
            let Some(url) = queue.dispatch_next() else {
                break QueueOutcome::Drained {
                    processed: queue.dispatched(),
                };
            };
            match self.visit(&url, term, &mut hits).await {
                Ok(children) => {
                    queue.complete();
                    queue.extend(children);
                }
                Err(error) => {
                    queue.fail(&error);
                    break QueueOutcome::Errored {
                        processed: queue.dispatched() - 1,
                        remaining: queue.pending(),
                        error,
                    };
                }
            }
        };

        info!(
            "Searched {} location(s) under {}: {} hit(s)",
            outcome.processed(),
            root,
            hits.len()
        );
        SearchReport {
            root,
            term: term.to_string(),
            visited: outcome.processed(),
            hits,
            queue: QueueReport::from_outcome(SEARCH_QUEUE, &outcome),
        }
    }

    async fn visit(
        &self,
        url: &str,
        term: &SearchTerm,
        hits: &mut Vec<SearchHit>,
    ) -> Result<Vec<String>> {
        let data = self.transport.get_json(&json_url(url)?).await?;
        hits.extend(match_response(url, &data, term));
        let children = child_urls(url, &data);
        debug!("{}: {} child location(s)", url, children.len());
        Ok(children)
    }
}
