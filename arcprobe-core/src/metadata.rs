// Service and layer metadata summaries

use crate::errors::{describe_error, response_error};
use crate::panel::{PanelItem, display_value, is_truthy, un_camel_case};
use serde_json::Value;

const SPATIAL_REFERENCE_SEARCH: &str = "http://spatialreference.org/ref/?search=";
const NO_SPATIAL_REFERENCE: &str = "No valid spatial reference available";

/// How a metadata property turns into a line.
#[derive(Debug, Clone, Copy)]
enum Render {
    /// Shown when truthy.
    Text,
    /// Shown when present; falsy values read "None".
    OrNone,
    /// Length of an array.
    Len,
    /// Length of a non-empty array.
    NonEmptyLen,
    /// Object properties as a nested list.
    SubList,
    /// Truthy string with a prefix removed.
    Strip(&'static str),
    /// `true` / `false`.
    Bool,
    YesNo,
    /// Title only, when a non-empty array.
    Flag,
    TimeReference,
    /// Shown when present, whatever the value.
    Raw,
}

/// Properties listed in a metadata panel, in display order.
const METADATA_RULES: &[(&str, &str, Render)] = &[
    ("description", "Description", Render::Text),
    ("serviceDescription", "Service Description", Render::Text),
    ("copyrightText", "©", Render::Text),
    ("layers", "# Layers", Render::Len),
    ("tables", "# Tables", Render::NonEmptyLen),
    ("minScale", "Min Scale", Render::OrNone),
    ("maxScale", "Max Scale", Render::OrNone),
    ("initialExtent", "Initial Extent", Render::SubList),
    ("fullExtent", "Full Extent", Render::SubList),
    ("extent", "Extent", Render::SubList),
    ("units", "Units", Render::Strip("esri")),
    ("documentInfo", "Document Info", Render::SubList),
    ("maxRecordCount", "Max Record Count", Render::Raw),
    ("geometryType", "Geometry", Render::Strip("esriGeometry")),
    ("definitionExpression", "Definition Expression", Render::Text),
    ("defaultVisibility", "Visible by default", Render::Bool),
    ("displayField", "Display Field", Render::Text),
    ("objectIdField", "Object ID Field", Render::Text),
    ("globalIdField", "Global ID Field", Render::Text),
    ("relationships", "Has Relationships", Render::Flag),
    ("isDataVersioned", "Versioned Data", Render::YesNo),
    ("dateFieldsTimeReference", "Date fields Time Zone", Render::TimeReference),
    ("supportedQueryFormats", "Supported Query Formats", Render::Raw),
    ("advancedQueryCapabilities", "Advanced Query Capabilities", Render::SubList),
];

/// Boolean properties already covered by a rule.
const FORMATTED_BOOLEANS: &[&str] = &["defaultVisibility", "isDataVersioned"];

/// Build the checklist of a service or layer document.
///
/// Returns `None` for anything that is not a JSON object. An error envelope
/// comes first; then every rule in `METADATA_RULES`; then one line per
/// remaining property that is `true`.
pub fn render_metadata(doc: &Value) -> Option<Vec<PanelItem>> {
    let properties = doc.as_object()?;
    let mut items = Vec::new();

    if let Some(error) = response_error(doc) {
        items.push(describe_error(error, None));
    }

    for (key, title, render) in METADATA_RULES {
        if let Some(value) = properties.get(*key)
            && let Some(item) = render_property(title, value, *render)
        {
            items.push(item);
        }
    }

    items.extend(
        properties
            .iter()
            .filter(|(key, value)| {
                **value == Value::Bool(true) && !FORMATTED_BOOLEANS.contains(&key.as_str())
            })
            .map(|(key, _)| PanelItem::label(un_camel_case(key))),
    );

    Some(items)
}

fn render_property(title: &str, value: &Value, render: Render) -> Option<PanelItem> {
    match render {
        Render::Text => is_truthy(value).then(|| PanelItem::entry(title, display_value(value))),
        Render::OrNone => Some(PanelItem::entry(
            title,
            if is_truthy(value) {
                display_value(value)
            } else {
                "None".to_string()
            },
        )),
        Render::Len => value
            .as_array()
            .map(|items| PanelItem::entry(title, items.len().to_string())),
        Render::NonEmptyLen => value
            .as_array()
            .filter(|items| !items.is_empty())
            .map(|items| PanelItem::entry(title, items.len().to_string())),
        Render::SubList => Some(PanelItem::sublist(title, property_list(value))),
        Render::Strip(prefix) => value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| PanelItem::entry(title, s.replacen(prefix, "", 1))),
        Render::Bool => Some(PanelItem::entry(title, display_value(value))),
        Render::YesNo => Some(PanelItem::entry(
            title,
            if is_truthy(value) { "Yes" } else { "No" },
        )),
        Render::Flag => value
            .as_array()
            .filter(|items| !items.is_empty())
            .map(|_| PanelItem::label(title)),
        Render::TimeReference => {
            if !is_truthy(value) {
                return None;
            }
            let zone = value
                .get("timeZone")
                .map(display_value)
                .unwrap_or_else(|| "unknown".to_string());
            let daylight = value
                .get("respectsDaylightSaving")
                .map(is_truthy)
                .unwrap_or(false);
            Some(PanelItem::entry(
                title,
                format!(
                    "{} (Daylight Savings Time {}supported)",
                    zone,
                    if daylight { "" } else { "not " }
                ),
            ))
        }
        Render::Raw => Some(PanelItem::entry(title, display_value(value))),
    }
}

/// Properties of an object as `Un Camel Cased: value` lines.
fn property_list(value: &Value) -> Vec<PanelItem> {
    value
        .as_object()
        .map(|properties| {
            properties
                .iter()
                .map(|(key, value)| PanelItem::entry(un_camel_case(key), display_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Spatial reference and cache mode of a service.
///
/// Returns `None` when the document carries no `spatialReference`.
pub fn render_spatial_reference(doc: &Value) -> Option<Vec<PanelItem>> {
    let reference = doc.get("spatialReference")?;

    let wkid = ["latestWkid", "wkid"]
        .iter()
        .filter_map(|key| reference.get(*key))
        .find(|value| is_truthy(value));
    let wkt = ["latestWkt", "wkt"]
        .iter()
        .filter_map(|key| reference.get(*key))
        .find(|value| is_truthy(value));

    let item = match (wkid, wkt) {
        (Some(wkid), _) => {
            let wkid = display_value(wkid);
            PanelItem::entry("Spatial Reference", wkid.clone())
                .with_link(format!("{}{}", SPATIAL_REFERENCE_SEARCH, wkid))
        }
        (None, Some(wkt)) => PanelItem::entry("Spatial Reference", display_value(wkt)),
        (None, None) => PanelItem::entry("Spatial Reference", NO_SPATIAL_REFERENCE),
    };

    let cache = if doc.get("singleFusedMapCache").map(is_truthy).unwrap_or(false) {
        "tiled"
    } else {
        "dynamic"
    };

    Some(vec![item, PanelItem::entry("Cache", cache)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scale_range_with_zero_max() {
        let items = render_metadata(&json!({"minScale": 100, "maxScale": 0})).unwrap();
        let lines: Vec<String> = items.iter().map(PanelItem::text).collect();
        assert_eq!(lines, vec!["Min Scale: 100", "Max Scale: None"]);
    }

    #[test]
    fn test_non_object_has_no_metadata() {
        assert!(render_metadata(&json!(null)).is_none());
        assert!(render_metadata(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_spatial_reference_prefers_latest_wkid() {
        let items = render_spatial_reference(&json!({
            "spatialReference": {"wkid": 102100, "latestWkid": 3857},
            "singleFusedMapCache": true
        }))
        .unwrap();

        assert_eq!(items[0].text(), "Spatial Reference: 3857");
        assert_eq!(
            items[0].link.as_deref(),
            Some("http://spatialreference.org/ref/?search=3857")
        );
        assert_eq!(items[1].text(), "Cache: tiled");
    }

    #[test]
    fn test_spatial_reference_wkt_has_no_link() {
        let items = render_spatial_reference(&json!({
            "spatialReference": {"wkt": "PROJCS[\"Local\"]"}
        }))
        .unwrap();

        assert_eq!(items[0].value.as_deref(), Some("PROJCS[\"Local\"]"));
        assert!(items[0].link.is_none());
        assert_eq!(items[1].text(), "Cache: dynamic");
    }

    #[test]
    fn test_spatial_reference_absent_or_empty() {
        assert!(render_spatial_reference(&json!({"name": "x"})).is_none());
        let items = render_spatial_reference(&json!({"spatialReference": {}})).unwrap();
        assert_eq!(
            items[0].text(),
            "Spatial Reference: No valid spatial reference available"
        );
    }
}
