//! Triage and extraction result shapes as returned by the model.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::taxonomy::ExtractionSchema;

/// How much of the document is handwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HandwritingDensity {
    #[serde(alias = "high", alias = "High")]
    High,
    #[serde(alias = "low", alias = "Low")]
    Low,
    #[serde(alias = "none", alias = "None")]
    None,
}

impl HandwritingDensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandwritingDensity::High => "HIGH",
            HandwritingDensity::Low => "LOW",
            HandwritingDensity::None => "NONE",
        }
    }
}

/// Triage outcome for one document. Confidence is provider-reported and kept
/// as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub lane_id: String,
    pub path_id: String,
    pub confidence: f64,
    pub handwriting_density: HandwritingDensity,
}

impl TriageResult {
    /// Structural checks on a decoded result. Never alters the values.
    ///
    /// Ids are not checked here: any pair outside the taxonomy, empty ones
    /// included, is an unknown category at the orchestrator gate.
    pub fn check(&self) -> Result<(), String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            ));
        }
        Ok(())
    }
}

/// `[ymin, xmin, ymax, xmax]` in the model's normalized coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox(pub [f64; 4]);

impl BoundingBox {
    pub fn ymin(&self) -> f64 {
        self.0[0]
    }

    pub fn xmin(&self) -> f64 {
        self.0[1]
    }

    pub fn ymax(&self) -> f64 {
        self.0[2]
    }

    pub fn xmax(&self) -> f64 {
        self.0[3]
    }
}

/// `null` and `[]` mean "no box"; anything else must be four numbers.
fn parse_bbox(raw: Value) -> Result<Option<BoundingBox>, String> {
    match raw {
        Value::Null => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        Value::Array(items) => {
            let coords: Option<Vec<f64>> = items.iter().map(Value::as_f64).collect();
            let coords = coords.ok_or("bounding box coordinates must be numbers")?;
            <[f64; 4]>::try_from(coords.as_slice())
                .map(|c| Some(BoundingBox(c)))
                .map_err(|_| format!("bounding box needs 4 coordinates, got {}", coords.len()))
        }
        other => Err(format!("bounding box must be an array, got {}", other)),
    }
}

fn optional_bbox<'de, D>(deserializer: D) -> Result<Option<BoundingBox>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    parse_bbox(raw).map_err(D::Error::custom)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One schema field as found (or not) in the document.
///
/// Accepts the `{ "value": ..., "bounding_box": [...] }` envelope, a bare
/// `null`, or a bare value without location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedField {
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl ExtractedField {
    /// Field declared by the schema but absent from the document.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found(value: Value, bounding_box: Option<BoundingBox>) -> Self {
        Self {
            value: (!value.is_null()).then_some(value),
            bounding_box,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    fn from_json(raw: Value) -> Result<Self, String> {
        match raw {
            Value::Null => Ok(Self::missing()),
            Value::Object(mut map) if map.contains_key("value") => {
                let value = map.remove("value").unwrap_or(Value::Null);
                let bounding_box = match map.remove("bounding_box").or_else(|| map.remove("bbox")) {
                    Some(raw_box) => parse_bbox(raw_box)?,
                    None => None,
                };
                Ok(Self::found(value, bounding_box))
            }
            other => Ok(Self::found(other, None)),
        }
    }
}

impl<'de> Deserialize<'de> for ExtractedField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_json(raw).map_err(D::Error::custom)
    }
}

/// Content outside any schema field: marginalia, handwritten notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    #[serde(
        default,
        alias = "bounding_box",
        deserialize_with = "optional_bbox",
        skip_serializing_if = "Option::is_none"
    )]
    pub bbox: Option<BoundingBox>,
}

/// Decoded transcription response. Unknown top-level keys are ignored.
///
/// `extracted_data` keeps response order until [`order_by_schema`](Self::order_by_schema)
/// puts it in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extracted_data: IndexMap<String, ExtractedField>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fragments: Vec<Fragment>,
}

impl ExtractionResult {
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.extracted_data.get(name)
    }

    /// Declared fields with no key at all in the response.
    pub fn missing_fields(&self, schema: &ExtractionSchema) -> Vec<String> {
        schema
            .field_names()
            .filter(|name| !self.extracted_data.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Response keys the schema does not declare.
    pub fn extra_fields(&self, schema: &ExtractionSchema) -> Vec<String> {
        self.extracted_data
            .keys()
            .filter(|name| schema.field(name).is_none())
            .cloned()
            .collect()
    }

    /// Found values whose JSON type does not fit the declared field type.
    pub fn type_mismatches(&self, schema: &ExtractionSchema) -> Vec<String> {
        self.extracted_data
            .iter()
            .filter_map(|(name, field)| {
                let spec = schema.field(name)?;
                let value = field.value.as_ref()?;
                (!spec.accepts(value)).then(|| name.clone())
            })
            .collect()
    }

    /// Drop keys outside the schema, returning what was removed.
    pub fn prune_to(&mut self, schema: &ExtractionSchema) -> Vec<String> {
        let extras = self.extra_fields(schema);
        for name in &extras {
            self.extracted_data.shift_remove(name);
        }
        extras
    }

    /// Reorder fields to the schema's declaration order. Undeclared keys go last.
    pub fn order_by_schema(&mut self, schema: &ExtractionSchema) {
        let position =
            |name: &str| schema.field_names().position(|n| n == name).unwrap_or(usize::MAX);
        self.extracted_data
            .sort_by(|a, _, b, _| position(a.as_str()).cmp(&position(b.as_str())));
    }

    pub fn found_count(&self) -> usize {
        self.extracted_data.values().filter(|f| f.is_found()).count()
    }
}
