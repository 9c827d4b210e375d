// Service schema types as published by ArcGIS REST endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// `esriFieldType*` of a field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Oid,
    GlobalId,
    Geometry,
    String,
    Integer,
    SmallInteger,
    Double,
    Single,
    Date,
    Blob,
    Xml,
    Raster,
    #[default]
    Unknown,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Oid => "esriFieldTypeOID",
            FieldType::GlobalId => "esriFieldTypeGlobalID",
            FieldType::Geometry => "esriFieldTypeGeometry",
            FieldType::String => "esriFieldTypeString",
            FieldType::Integer => "esriFieldTypeInteger",
            FieldType::SmallInteger => "esriFieldTypeSmallInteger",
            FieldType::Double => "esriFieldTypeDouble",
            FieldType::Single => "esriFieldTypeSingle",
            FieldType::Date => "esriFieldTypeDate",
            FieldType::Blob => "esriFieldTypeBlob",
            FieldType::Xml => "esriFieldTypeXML",
            FieldType::Raster => "esriFieldTypeRaster",
            FieldType::Unknown => "",
            FieldType::Other(name) => name,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String)
    }

    /// Geometry, blob, XML and raster columns cannot be used in a where clause.
    pub fn is_queryable(&self) -> bool {
        !matches!(
            self,
            FieldType::Geometry | FieldType::Blob | FieldType::Xml | FieldType::Raster
        )
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "esriFieldTypeOID" => FieldType::Oid,
            "esriFieldTypeGlobalID" => FieldType::GlobalId,
            "esriFieldTypeGeometry" => FieldType::Geometry,
            "esriFieldTypeString" => FieldType::String,
            "esriFieldTypeInteger" => FieldType::Integer,
            "esriFieldTypeSmallInteger" => FieldType::SmallInteger,
            "esriFieldTypeDouble" => FieldType::Double,
            "esriFieldTypeSingle" => FieldType::Single,
            "esriFieldTypeDate" => FieldType::Date,
            "esriFieldTypeBlob" => FieldType::Blob,
            "esriFieldTypeXML" => FieldType::Xml,
            "esriFieldTypeRaster" => FieldType::Raster,
            "" => FieldType::Unknown,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a layer's `fields` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub domain: Option<Domain>,
}

impl FieldDescriptor {
    pub fn coded_values(&self) -> Option<&[CodedValue]> {
        self.domain
            .as_ref()
            .and_then(|domain| domain.coded_values.as_deref())
            .filter(|values| !values.is_empty())
    }

    pub fn has_coded_domain(&self) -> bool {
        self.coded_values().is_some()
    }

    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|alias| !alias.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(rename = "type", default)]
    pub domain_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "codedValues", default)]
    pub coded_values: Option<Vec<CodedValue>>,
}

/// A legal value of a coded domain. `code` is a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: Value,
    #[serde(default)]
    pub name: String,
}

/// A domain code queued for counting, carrying the owning field's name and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProbe {
    pub field_name: String,
    pub field_type: FieldType,
    pub code: Value,
    pub name: String,
}

impl DomainProbe {
    /// One probe per coded value, in domain order.
    pub fn for_field(field: &FieldDescriptor) -> Vec<DomainProbe> {
        field
            .coded_values()
            .unwrap_or_default()
            .iter()
            .map(|coded| DomainProbe {
                field_name: field.name.clone(),
                field_type: field.field_type.clone(),
                code: coded.code.clone(),
                name: coded.name.clone(),
            })
            .collect()
    }

    /// The code as it appears on the right-hand side of a where clause.
    pub fn literal(&self) -> String {
        let raw = match &self.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if self.field_type.is_string() {
            format!("'{}'", raw.replace('\'', "''"))
        } else {
            raw
        }
    }
}

/// Parse the `fields` array of a layer document, skipping malformed entries.
pub fn fields_of(doc: &Value) -> Vec<FieldDescriptor> {
    indexed_fields_of(doc)
        .into_iter()
        .map(|(_, field)| field)
        .collect()
}

/// Like `fields_of`, keeping each field's position in the raw array so
/// skipped entries do not shift the ones after them.
pub fn indexed_fields_of(doc: &Value) -> Vec<(usize, FieldDescriptor)> {
    doc.get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .enumerate()
                .filter_map(|(i, field)| {
                    serde_json::from_value(field.clone())
                        .inspect_err(|e| debug!("Skipping field {}: {}", i, e))
                        .ok()
                        .map(|field| (i, field))
                })
                .collect()
        })
        .unwrap_or_default()
}
