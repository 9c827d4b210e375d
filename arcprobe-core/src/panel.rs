// Result panels attached to the anchors of a scanned page

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid camel case pattern"));

/// What a panel hangs off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anchor", rename_all = "snake_case")]
pub enum Anchor {
    /// A service link found on the page.
    Link { index: usize, url: String },
    /// An entry of the layer page's field list.
    Field { name: String, label: String },
    /// The scanned page itself.
    Page { url: String },
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Link { index, url } => write!(f, "[#{}] {}", index, url),
            Anchor::Field { name, label } if label != name => write!(f, "Field {} ({})", name, label),
            Anchor::Field { name, .. } => write!(f, "Field {}", name),
            Anchor::Page { url } => write!(f, "Page {}", url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    SpatialReference,
    Metadata,
    FeatureCounts,
    FieldCounts,
    DomainCounts,
    FindHelper,
    /// The page itself could not be fetched.
    Page,
}

impl PanelKind {
    pub fn title(&self) -> &'static str {
        match self {
            PanelKind::SpatialReference => "Spatial Reference",
            PanelKind::Metadata => "Metadata",
            PanelKind::FeatureCounts => "Feature Counts",
            PanelKind::FieldCounts => "Field Values",
            PanelKind::DomainCounts => "Domain Values",
            PanelKind::FindHelper => "Find Helper",
            PanelKind::Page => "Page",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFlag {
    #[default]
    Normal,
    Error,
    /// A count of zero.
    Empty,
}

/// A line of a panel, possibly with nested lines.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PanelItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<PanelItem>,
    #[serde(default)]
    pub flag: ItemFlag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl PanelItem {
    pub fn entry(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// A title-only line.
    pub fn label(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn sublist(title: impl Into<String>, children: Vec<PanelItem>) -> Self {
        Self {
            title: title.into(),
            children,
            ..Default::default()
        }
    }

    /// A feature count; zero is flagged.
    pub fn count(title: impl Into<String>, count: u64) -> Self {
        let flag = if count == 0 {
            ItemFlag::Empty
        } else {
            ItemFlag::Normal
        };
        Self::entry(title, count.to_string()).with_flag(flag)
    }

    pub fn with_flag(mut self, flag: ItemFlag) -> Self {
        self.flag = flag;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn is_error(&self) -> bool {
        self.flag == ItemFlag::Error
    }

    /// `Title: value`, or just the title.
    pub fn text(&self) -> String {
        match &self.value {
            Some(value) => format!("{}: {}", self.title, value),
            None if !self.children.is_empty() => format!("{}:", self.title),
            None => self.title.clone(),
        }
    }
}

impl fmt::Display for PanelItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// A group of result lines attached to one anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub anchor: Anchor,
    pub kind: PanelKind,
    pub collapsed: bool,
    pub items: Vec<PanelItem>,
}

impl Panel {
    pub fn new(anchor: Anchor, kind: PanelKind) -> Self {
        Self {
            anchor,
            kind,
            collapsed: kind == PanelKind::Metadata,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<PanelItem>) -> Self {
        self.items = items;
        self
    }

    pub fn push(&mut self, item: PanelItem) {
        self.items.push(item);
    }

    /// Flip the collapsed state. Purely presentational.
    pub fn toggle(&mut self) {
        self.collapsed = !self.collapsed;
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(PanelItem::is_error)
    }

    /// Find a top-level line by title.
    pub fn item(&self, title: &str) -> Option<&PanelItem> {
        self.items.iter().find(|item| item.title == title)
    }
}

/// `maxRecordCount` -> `Max Record Count`
pub fn un_camel_case(value: &str) -> String {
    let spaced = CAMEL_BOUNDARY.replace_all(value, "$1 $2");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// JSON value as shown to the user: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose truthiness of a JSON value: null, false, 0 and "" are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_un_camel_case() {
        assert_eq!(un_camel_case("maxRecordCount"), "Max Record Count");
        assert_eq!(un_camel_case("xmin"), "Xmin");
        assert_eq!(un_camel_case("supportsStatistics"), "Supports Statistics");
        assert_eq!(un_camel_case(""), "");
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!(100)));
        assert!(is_truthy(&json!([])));
    }

    #[test]
    fn test_count_flags_zero() {
        assert_eq!(PanelItem::count("Features", 0).flag, ItemFlag::Empty);
        assert_eq!(PanelItem::count("Features", 4).flag, ItemFlag::Normal);
        assert_eq!(PanelItem::count("Features", 4).text(), "Features: 4");
    }

    #[test]
    fn test_metadata_panels_start_collapsed_and_toggle() {
        let mut panel = Panel::new(
            Anchor::Link {
                index: 0,
                url: "https://h/MapServer".to_string(),
            },
            PanelKind::Metadata,
        );
        assert!(panel.collapsed);
        panel.toggle();
        assert!(!panel.collapsed);

        let counts = Panel::new(
            Anchor::Field {
                name: "NAME".to_string(),
                label: "NAME".to_string(),
            },
            PanelKind::FieldCounts,
        );
        assert!(!counts.collapsed);
    }

    #[test]
    fn test_anchor_display() {
        let field = Anchor::Field {
            name: "NAME".to_string(),
            label: "NAME (type: esriFieldTypeString)".to_string(),
        };
        assert_eq!(field.to_string(), "Field NAME (NAME (type: esriFieldTypeString))");
    }
}
