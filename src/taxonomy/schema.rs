//! Declarative extraction schemas attached to each lane path.
//!
//! A schema is an ordered set of field names, each carrying a [`FieldSpec`].
//! Field specs serialize to the same `{ "type": ..., "description": ..., "items": ... }`
//! shape the transcriber embeds in its prompt, so the wire form doubles as the
//! on-disk taxonomy format.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scalar value kinds a schema field may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Number,
    Date,
    Currency,
    Percentage,
    Boolean,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Date => "date",
            ScalarType::Currency => "currency",
            ScalarType::Percentage => "percentage",
            ScalarType::Boolean => "boolean",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" => Some(ScalarType::String),
            "number" => Some(ScalarType::Number),
            "date" => Some(ScalarType::Date),
            "currency" => Some(ScalarType::Currency),
            "percentage" => Some(ScalarType::Percentage),
            "boolean" => Some(ScalarType::Boolean),
            _ => None,
        }
    }

    /// Lenient check that a model-reported value plausibly has this type.
    ///
    /// Models routinely report currency as `"$1,200.00"` and percentages as
    /// `"12.5%"`, so those kinds accept strings as well as numbers.
    fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;
        match self {
            ScalarType::String | ScalarType::Date => value.is_string(),
            ScalarType::Number => value.is_number(),
            ScalarType::Currency | ScalarType::Percentage => {
                value.is_number() || value.is_string()
            }
            ScalarType::Boolean => matches!(value, Value::Bool(_)),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The shape of a single schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(ScalarType),
    /// Open-ended list; element shape is left to the document.
    Array,
    /// Nested record with its own named sub-fields.
    Object(SchemaFields),
}

/// A field declaration: its type plus an optional hint for the model.
///
/// Descriptions are phrased as forensic questions ("Was it sold for $1?") and
/// are passed to the model verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSpec", into = "RawFieldSpec")]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub description: Option<String>,
}

impl FieldSpec {
    pub fn scalar(kind: ScalarType) -> Self {
        Self {
            field_type: FieldType::Scalar(kind),
            description: None,
        }
    }

    pub fn array() -> Self {
        Self {
            field_type: FieldType::Array,
            description: None,
        }
    }

    pub fn object<I, K>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldSpec)>,
        K: Into<String>,
    {
        Self {
            field_type: FieldType::Object(
                items.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Type name as it appears in the serialized schema.
    pub fn type_name(&self) -> &'static str {
        match &self.field_type {
            FieldType::Scalar(s) => s.as_str(),
            FieldType::Array => "array",
            FieldType::Object(_) => "object",
        }
    }

    /// Check whether a non-null value is compatible with this spec.
    ///
    /// Null is always accepted. Nested objects are checked field by field,
    /// tolerating both bare values and `{ "value": ... }` envelopes.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        if value.is_null() {
            return true;
        }
        match &self.field_type {
            FieldType::Scalar(kind) => kind.accepts(value),
            FieldType::Array => value.is_array(),
            FieldType::Object(items) => match value.as_object() {
                Some(map) => map.iter().all(|(key, v)| match items.get(key) {
                    Some(spec) => {
                        let inner = v
                            .as_object()
                            .filter(|o| o.contains_key("value"))
                            .and_then(|o| o.get("value"))
                            .unwrap_or(v);
                        spec.accepts(inner)
                    }
                    None => true,
                }),
                None => false,
            },
        }
    }
}

/// Serde surface for [`FieldSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<SchemaFields>,
}

impl TryFrom<RawFieldSpec> for FieldSpec {
    type Error = String;

    fn try_from(raw: RawFieldSpec) -> Result<Self, Self::Error> {
        let field_type = match raw.kind.to_lowercase().as_str() {
            "array" => {
                if raw.items.is_some() {
                    return Err("'items' is only valid on object fields".to_string());
                }
                FieldType::Array
            }
            "object" => {
                let items = raw
                    .items
                    .ok_or_else(|| "object fields require 'items'".to_string())?;
                if items.is_empty() {
                    return Err("object fields require at least one item".to_string());
                }
                FieldType::Object(items)
            }
            other => {
                if raw.items.is_some() {
                    return Err("'items' is only valid on object fields".to_string());
                }
                FieldType::Scalar(
                    ScalarType::from_str(other)
                        .ok_or_else(|| format!("unknown field type '{}'", other))?,
                )
            }
        };
        Ok(FieldSpec {
            field_type,
            description: raw.description,
        })
    }
}

impl From<FieldSpec> for RawFieldSpec {
    fn from(spec: FieldSpec) -> Self {
        let kind = spec.type_name().to_string();
        let items = match spec.field_type {
            FieldType::Object(items) => Some(items),
            _ => None,
        };
        RawFieldSpec {
            kind,
            description: spec.description,
            items,
        }
    }
}

/// Ordered field-name → spec mapping.
///
/// Declaration order is preserved through serialization so prompts list
/// fields the way the lane author wrote them. Duplicate names are rejected
/// on deserialization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaFields(Vec<(String, FieldSpec)>);

impl SchemaFields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FieldSpec)> for SchemaFields {
    fn from_iter<T: IntoIterator<Item = (String, FieldSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for SchemaFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SchemaFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = SchemaFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to field specs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fields: Vec<(String, FieldSpec)> = Vec::new();
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    if fields.iter().any(|(k, _)| *k == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate field '{}'",
                            name
                        )));
                    }
                    fields.push((name, spec));
                }
                Ok(SchemaFields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// Per-path extraction schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionSchema {
    pub target_data_elements: SchemaFields,
}

impl ExtractionSchema {
    pub fn new(fields: SchemaFields) -> Self {
        Self {
            target_data_elements: fields,
        }
    }

    /// Declared top-level field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.target_data_elements.names()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.target_data_elements.get(name)
    }

    pub fn len(&self) -> usize {
        self.target_data_elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target_data_elements.is_empty()
    }

    /// Pretty JSON rendering embedded verbatim in extraction prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
