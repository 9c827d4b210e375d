// Query building helpers: layer and field pickers, distinct values, where clause editing,
// canned query forms and output statistics

use crate::model::{FieldDescriptor, fields_of};
use crate::panel::display_value;
use crate::query::distinct_values_url;
use arcprobe_scanner::links::{is_single_layer, strip_query};
use arcprobe_scanner::transport::json_url;
use arcprobe_scanner::{Result, Transport};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

pub const NO_VALUES: &str = "No values found for this field";

/// Name of the query form input holding output statistics.
pub const OUT_STATISTICS: &str = "outStatistics";

/// Tokens after which the caret stays between the two characters.
const PAIRED_TOKENS: [&str; 2] = ["()", "''"];

/// Fields usable in a where clause.
pub fn queryable_fields(fields: &[FieldDescriptor]) -> Vec<&FieldDescriptor> {
    fields
        .iter()
        .filter(|field| field.field_type.is_queryable())
        .collect()
}

/// A layer or table that holds data of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub id: i64,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

/// Layers and tables of a `/layers` document, or the document itself when it
/// describes a single layer. Group layers are left out.
pub fn leaf_layers(doc: &Value) -> Vec<LayerEntry> {
    let mut items: Vec<&Value> = ["layers", "tables"]
        .iter()
        .filter_map(|key| doc.get(*key).and_then(Value::as_array))
        .flatten()
        .collect();
    if items.is_empty() {
        items.push(doc);
    }

    items
        .into_iter()
        .filter(|item| !has_sub_layers(item))
        .filter_map(|item| {
            let id = item.get("id").and_then(Value::as_i64)?;
            let name = item
                .get("name")
                .or_else(|| item.get("title"))
                .map(display_value)
                .unwrap_or_default();
            Some(LayerEntry {
                id,
                name,
                fields: fields_of(item),
            })
        })
        .collect()
}

fn has_sub_layers(item: &Value) -> bool {
    item.get("subLayers")
        .and_then(Value::as_array)
        .is_some_and(|sub| !sub.is_empty())
}

/// `1,2,5`, the value the find form expects in its `layers` input.
pub fn layer_ids_csv(layers: &[LayerEntry]) -> String {
    layers
        .iter()
        .map(|layer| layer.id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Fetch the leaf layers behind a service or single layer URL.
pub async fn fetch_layers(transport: &dyn Transport, url: &str) -> Result<Vec<LayerEntry>> {
    let base = strip_query(url).trim_end_matches('/');
    let resource = if is_single_layer(base) {
        base.to_string()
    } else {
        format!("{}/layers", base)
    };

    let doc = transport.get_json(&json_url(&resource)?).await?;
    let layers = leaf_layers(&doc);
    info!("{} leaf layer(s) at {}", layers.len(), base);
    Ok(layers)
}

/// One distinct value: what is shown, and what goes into a where clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctValue {
    pub label: String,
    pub literal: String,
}

impl DistinctValue {
    pub fn from_value(value: &Value) -> Self {
        let label = display_value(value);
        let literal = match value {
            Value::Null => "NULL".to_string(),
            Value::Number(_) | Value::Bool(_) => label.clone(),
            Value::String(s) if is_numeric(s) => s.trim().to_string(),
            _ => format!("'{}'", label.replace('\'', "''")),
        };
        Self { label, literal }
    }
}

fn is_numeric(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Distinct values of `field` in layer `layer_id`, in service order.
pub async fn fetch_distinct_values(
    transport: &dyn Transport,
    service_url: &str,
    layer_id: i64,
    field: &str,
) -> Result<Vec<DistinctValue>> {
    let url = distinct_values_url(service_url, layer_id, field)?;
    let response = transport.get_json(&url).await?;

    let values: Vec<DistinctValue> = response
        .get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .map(|feature| {
                    let value = feature
                        .get("attributes")
                        .and_then(|attributes| attributes.get(field))
                        .unwrap_or(&Value::Null);
                    DistinctValue::from_value(value)
                })
                .collect()
        })
        .unwrap_or_default();

    debug!("{} distinct value(s) for {}", values.len(), field);
    Ok(values)
}

/// Quick fill-ins for a layer's query form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPreset {
    SelectAll,
    SelectAllButGeometry,
    CountOnly,
    SelectDistinct,
}

impl QueryPreset {
    pub const ALL: [QueryPreset; 4] = [
        QueryPreset::SelectAll,
        QueryPreset::SelectAllButGeometry,
        QueryPreset::CountOnly,
        QueryPreset::SelectDistinct,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QueryPreset::SelectAll => "select-all",
            QueryPreset::SelectAllButGeometry => "no-geometry",
            QueryPreset::CountOnly => "count",
            QueryPreset::SelectDistinct => "distinct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }

    pub fn title(&self) -> &'static str {
        match self {
            QueryPreset::SelectAll => "Select All",
            QueryPreset::SelectAllButGeometry => "Select All but Geometry",
            QueryPreset::CountOnly => "Get Count Only",
            QueryPreset::SelectDistinct => "Select Distinct",
        }
    }

    pub fn form_data(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            QueryPreset::SelectAll => &[
                ("where", "1=1"),
                ("outFields", "*"),
                ("returnCountOnly", "false"),
                ("returnGeometry", "true"),
            ],
            QueryPreset::SelectAllButGeometry => &[
                ("where", "1=1"),
                ("outFields", "*"),
                ("returnCountOnly", "false"),
                ("returnGeometry", "false"),
            ],
            QueryPreset::CountOnly => &[
                ("where", "1=1"),
                ("returnDistinctValues", "false"),
                ("returnCountOnly", "true"),
                ("returnGeometry", "false"),
            ],
            QueryPreset::SelectDistinct => &[
                ("where", "1=1"),
                ("returnDistinctValues", "true"),
                ("returnGeometry", "false"),
            ],
        }
    }

    /// Whether filling in the preset also sends the query.
    pub fn submits(&self) -> bool {
        !matches!(self, QueryPreset::SelectDistinct)
    }
}

/// Name/value pairs of a layer query form, in the order they were first set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryForm {
    values: Vec<(String, String)>,
}

impl QueryForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn apply(&mut self, preset: QueryPreset) {
        for (name, value) in preset.form_data() {
            self.set(name, *value);
        }
    }

    /// The `query` URL of `layer_url` with the form filled in.
    pub fn url(&self, layer_url: &str) -> Result<Url> {
        let base = strip_query(layer_url).trim_end_matches('/');
        let base = base.strip_suffix("/query").unwrap_or(base);
        let mut url = Url::parse(&format!("{}/query", base))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.values {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("f", "json");
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticType {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    StdDev,
    Var,
}

impl StatisticType {
    pub const ALL: [StatisticType; 7] = [
        StatisticType::Count,
        StatisticType::Sum,
        StatisticType::Min,
        StatisticType::Max,
        StatisticType::Avg,
        StatisticType::StdDev,
        StatisticType::Var,
    ];

    /// The `statisticType` value the service expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticType::Count => "count",
            StatisticType::Sum => "sum",
            StatisticType::Min => "min",
            StatisticType::Max => "max",
            StatisticType::Avg => "avg",
            StatisticType::StdDev => "stddev",
            StatisticType::Var => "var",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        Self::ALL.into_iter().find(|stat| stat.as_str() == name)
    }
}

/// The text input being edited and its caret.
///
/// The caret counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveFieldTracker {
    name: String,
    text: String,
    caret: usize,
}

impl ActiveFieldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the input called `name` active.
    pub fn focus(&mut self, name: &str, text: impl Into<String>, caret: Option<usize>) {
        self.name = name.to_string();
        self.set(text, caret);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remember `text` as the active input, caret clamped to its end.
    pub fn set(&mut self, text: impl Into<String>, caret: Option<usize>) {
        self.text = text.into();
        let len = self.text.chars().count();
        self.caret = caret.map_or(len, |caret| caret.min(len));
    }

    pub fn get(&self) -> &str {
        &self.text
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    /// Append a statistic to the active `outStatistics` input.
    ///
    /// Text that is not a JSON array is replaced. Returns the new text, or
    /// `None` when some other input is active.
    pub fn add_statistic(
        &mut self,
        statistic: StatisticType,
        on_field: &str,
        out_name: &str,
    ) -> Option<&str> {
        if self.name != OUT_STATISTICS {
            return None;
        }

        let mut stats = match serde_json::from_str::<Value>(&self.text) {
            Ok(Value::Array(stats)) => stats,
            _ => Vec::new(),
        };
        stats.push(json!({
            "statisticType": statistic.as_str(),
            "onStatisticField": on_field,
            "outStatisticFieldName": out_name,
        }));

        self.text = Value::Array(stats).to_string();
        self.caret = self.text.chars().count();
        Some(&self.text)
    }

    /// Insert `token` at the caret. The caret moves past the token, except
    /// for `()` and `''` where it lands between the pair.
    pub fn insert(&mut self, token: &str) {
        let at = self
            .text
            .char_indices()
            .nth(self.caret)
            .map_or(self.text.len(), |(i, _)| i);
        self.text.insert_str(at, token);

        self.caret += token.chars().count();
        if PAIRED_TOKENS.contains(&token) {
            self.caret -= 1;
        }
    }
}
