//! Wire types returned by the prediction service.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Label used when a record carries none.
pub const DEFAULT_LABEL: &str = "Gun";

/// Body of a successful `/predict/json/` call.
///
/// Parsing is lenient: a field of an unexpected type reads as absent and a
/// malformed record falls back to defaults, so any JSON body renders.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct DetectionResult {
    /// Annotated image as a data URL.
    #[serde(default, deserialize_with = "string_or_none")]
    pub image: Option<String>,

    /// Reported count, kept as sent so it can be shown verbatim.
    #[serde(default)]
    pub count: Option<Value>,

    /// Records in the order the service returned them. A non-array value
    /// reads as absent.
    #[serde(default, deserialize_with = "detections_if_array")]
    pub detections: Option<Vec<Detection>>,
}

fn string_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

fn detections_if_array<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<Detection>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(Some(items.into_iter().map(Detection::from).collect())),
        _ => Ok(None),
    }
}

impl DetectionResult {
    /// Fails only when the body is not JSON. A JSON value that is not an
    /// object reads as an empty result.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).context("parse detection result")?;
        if !value.is_object() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).context("parse detection result")
    }

    /// Count as displayed; absent or null shows "0".
    pub fn count_text(&self) -> String {
        match &self.count {
            None | Some(Value::Null) => "0".to_string(),
            Some(Value::Number(n)) => number_text(n),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Whether the service reported zero detections. Only a numeric zero
    /// (or no count at all) counts; `"0"` does not.
    pub fn count_is_zero(&self) -> bool {
        match &self.count {
            None | Some(Value::Null) => true,
            Some(Value::Number(n)) => n.as_f64() == Some(0.0),
            Some(_) => false,
        }
    }

    pub fn detections(&self) -> &[Detection] {
        self.detections.as_deref().unwrap_or(&[])
    }
}

/// Integers print as integers and `2.0` prints as `2`.
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

/// One server-reported bounding box.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(from = "Value")]
pub struct Detection {
    pub label: Option<String>,
    pub score: Option<f64>,
    /// `[x1, y1, x2, y2]` in image pixels; only set when the record's `box`
    /// starts with four numbers.
    pub bbox: Option<[f64; 4]>,
}

impl From<Value> for Detection {
    fn from(value: Value) -> Self {
        let Value::Object(fields) = value else {
            return Self::default();
        };
        let label = match fields.get("label") {
            Some(Value::String(text)) => Some(text.clone()),
            _ => None,
        };
        let score = match fields.get("score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        };
        let bbox = match fields.get("box") {
            Some(Value::Array(items)) if items.len() >= 4 => {
                match (items[0].as_f64(), items[1].as_f64(), items[2].as_f64(), items[3].as_f64()) {
                    (Some(x1), Some(y1), Some(x2), Some(y2)) => Some([x1, y1, x2, y2]),
                    _ => None,
                }
            }
            _ => None,
        };
        Self { label, score, bbox }
    }
}

impl Detection {
    /// Label, falling back to the default for missing or empty values.
    pub fn label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => DEFAULT_LABEL,
        }
    }

    pub fn score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// The four corner coordinates, when the record has a complete box.
    pub fn corners(&self) -> Option<[f64; 4]> {
        self.bbox
    }
}

/// Error body some failures carry, e.g. `{"detail": "model unavailable"}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: Option<String>,
}

impl ErrorBody {
    /// `None` when the body is not JSON at all.
    ///
    /// A non-empty string `detail` is used as is; structured details (lists of
    /// validation errors) keep their JSON text; anything else counts as absent.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(body).ok()?;
        let detail = match value.get("detail") {
            Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
            Some(other @ (Value::Array(_) | Value::Object(_))) => Some(other.to_string()),
            Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            Some(Value::Bool(true)) => Some("true".to_string()),
            _ => None,
        };
        Some(Self { detail })
    }
}

/// Body of the `GET /` health check.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServiceGreeting {
    pub message: String,
}
