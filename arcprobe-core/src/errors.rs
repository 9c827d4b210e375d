// Friendly messages for error envelopes returned by map services

use crate::model::FieldType;
use crate::panel::{ItemFlag, PanelItem, display_value, is_truthy, un_camel_case};
use serde_json::Value;

pub const SHAPEFILE_COUNT_CODE: i64 = -2147220985;
pub const BAD_REQUEST_CODE: i64 = 400;
const UNKNOWN_CODE: i64 = -99999;

pub const SHAPEFILE_COUNT_MESSAGE: &str =
    "Cannot count features with valid shape fields in a shapefile";
pub const NULL_OBJECTID_MESSAGE: &str = "Service does not support checking for null ObjectID";
pub const NULL_GEOMETRY_MESSAGE: &str =
    "Service datasource does not support checking for null/empty geometry";

/// The `error` member of a response body, when it is set.
pub fn response_error(response: &Value) -> Option<&Value> {
    response.get("error").filter(|error| is_truthy(error))
}

/// Numeric code of an error object. Some services spell it `Code`.
pub fn error_code(error: &Value) -> i64 {
    error
        .get("Code")
        .or_else(|| error.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or(UNKNOWN_CODE)
}

/// Lookup of the canned message for `(code, field type)`.
pub fn known_message(code: i64, context: Option<&FieldType>) -> Option<&'static str> {
    match (code, context) {
        (SHAPEFILE_COUNT_CODE, _) => Some(SHAPEFILE_COUNT_MESSAGE),
        (BAD_REQUEST_CODE, Some(FieldType::Oid)) => Some(NULL_OBJECTID_MESSAGE),
        (BAD_REQUEST_CODE, Some(FieldType::Geometry)) => Some(NULL_GEOMETRY_MESSAGE),
        _ => None,
    }
}

/// Render an error envelope, using the type of the field being queried as context.
pub fn describe_error(error: &Value, context: Option<&FieldType>) -> PanelItem {
    if let Some(message) = known_message(error_code(error), context) {
        return PanelItem::label(message).with_flag(ItemFlag::Error);
    }

    let item = match error.as_object() {
        Some(properties) => PanelItem::sublist(
            "Error",
            properties
                .iter()
                .map(|(key, value)| PanelItem::entry(un_camel_case(key), display_value(value)))
                .collect(),
        ),
        None => PanelItem::entry("Error", display_value(error)),
    };
    item.with_flag(ItemFlag::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oid_context_maps_400() {
        let item = describe_error(
            &json!({"code": 400, "message": "Unable to complete operation.", "details": []}),
            Some(&FieldType::Oid),
        );
        assert_eq!(item.text(), NULL_OBJECTID_MESSAGE);
        assert!(item.children.is_empty());
        assert!(item.is_error());
    }

    #[test]
    fn test_geometry_context_maps_400() {
        let item = describe_error(&json!({"code": 400}), Some(&FieldType::Geometry));
        assert_eq!(item.title, NULL_GEOMETRY_MESSAGE);
    }

    #[test]
    fn test_shapefile_code_ignores_context() {
        let item = describe_error(&json!({"Code": -2147220985}), None);
        assert_eq!(item.title, SHAPEFILE_COUNT_MESSAGE);
    }

    #[test]
    fn test_unknown_error_dumps_properties() {
        let item = describe_error(
            &json!({"code": 400, "message": "Invalid query", "details": ["bad where"]}),
            Some(&FieldType::String),
        );
        assert_eq!(item.title, "Error");
        assert_eq!(item.children.len(), 3);
        assert_eq!(item.children[0].text(), "Code: 400");
        assert_eq!(item.children[1].text(), "Message: Invalid query");
        assert_eq!(item.children[2].text(), "Details: [\"bad where\"]");
    }

    #[test]
    fn test_response_error_ignores_falsy() {
        assert!(response_error(&json!({"count": 1})).is_none());
        assert!(response_error(&json!({"error": null})).is_none());
        assert!(response_error(&json!({"error": {"code": 500}})).is_some());
    }
}
