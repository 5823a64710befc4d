//! Parsed intent wrapper.
//!
//! The interpretation collaborator is a black box; whatever structure it
//! returns is carried through the pipeline as-is. This wrapper only adds the
//! few inspections the orchestrator itself needs: intent classification and
//! field access.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured intent produced by the interpretation collaborator.
///
/// The inner value is opaque to the pipeline except for the `intent` field,
/// which the orchestrator inspects to route anomaly requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedIntent(Value);

impl ParsedIntent {
    /// Wrap a raw intent value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw intent value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the wrapper and return the raw value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|obj| obj.get(key))
    }

    /// The declared intent kind, if present.
    pub fn intent_kind(&self) -> Option<&str> {
        self.get("intent").and_then(Value::as_str)
    }

    /// Whether this intent requests anomaly detection.
    ///
    /// Anomaly requests take the dedicated detect-and-visualize route and
    /// never enter the build/execute path.
    pub fn is_anomaly(&self) -> bool {
        self.intent_kind()
            .map(|kind| kind.to_ascii_lowercase().contains("anomal"))
            .unwrap_or(false)
    }

    /// Whether the intent carries any content at all.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(obj) => obj.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

impl From<Value> for ParsedIntent {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
