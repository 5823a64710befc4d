//! Query fingerprint normalization.
//!
//! Maps a request to a stable string key, most-specific representation
//! first: executable query text, then structured intent, then the raw user
//! message. Logically identical requests must always normalize to identical
//! fingerprints regardless of key order or numeric-string vs. numeric
//! representation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scope assigned to intents that arrive without one.
pub const DEFAULT_SCOPE: &str = "time_bounded";

/// A deterministic cache key identifying a logically equivalent request.
///
/// An empty fingerprint means the request had no usable representation at
/// all; callers must treat it as non-cacheable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Derive a fingerprint, preferring the most specific representation.
    pub fn derive(
        query_text: Option<&str>,
        intent: Option<&Value>,
        user_message: Option<&str>,
    ) -> Self {
        if let Some(text) = query_text {
            if !text.trim().is_empty() {
                return Self::from_query_text(text);
            }
        }
        if let Some(value) = intent {
            if let Some(fingerprint) = Self::from_intent(value) {
                return fingerprint;
            }
        }
        if let Some(message) = user_message {
            if !message.trim().is_empty() {
                return Self::from_message(message);
            }
        }
        Self(String::new())
    }

    /// Fingerprint from executable query text: whitespace runs collapse to
    /// single spaces, leading/trailing whitespace is trimmed.
    pub fn from_query_text(text: &str) -> Self {
        Self(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// Fingerprint from a structured intent.
    ///
    /// Only a non-empty JSON object is usable. The intent is copied, given a
    /// default `scope` when absent or empty, digit-only strings are
    /// converted to numbers, and the result is serialized with sorted keys.
    /// `serde_json`'s default map is ordered by key, which makes the
    /// serialization canonical; the `preserve_order` feature must stay off.
    pub fn from_intent(intent: &Value) -> Option<Self> {
        let obj = intent.as_object()?;
        if obj.is_empty() {
            return None;
        }

        let mut normalized = obj.clone();
        let scope_missing = match normalized.get("scope") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        if scope_missing {
            normalized.insert("scope".to_string(), Value::String(DEFAULT_SCOPE.to_string()));
        }

        let normalized = normalize_numbers(Value::Object(normalized));
        Some(Self(serde_json::to_string(&normalized).unwrap_or_default()))
    }

    /// Fingerprint from the raw user message: trimmed verbatim.
    pub fn from_message(message: &str) -> Self {
        Self(message.trim().to_string())
    }

    /// The fingerprint key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this fingerprint can be used as a cache key.
    pub fn is_cacheable(&self) -> bool {
        !self.0.is_empty()
    }
}

impl std::fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recursively convert digit-only strings into numbers and trim the rest.
///
/// Digit strings that overflow `i64` stay strings; since that holds on both
/// sides of any comparison, the equal-fingerprint invariant is preserved.
fn normalize_numbers(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_numbers(v)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(normalize_numbers).collect())
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(n) = trimmed.parse::<i64>() {
                    return Value::Number(n.into());
                }
            }
            Value::String(trimmed.to_string())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_query_text_whitespace_collapses() {
        let a = QueryFingerprint::from_query_text("SELECT a\n  FROM   t\t WHERE x = 1 ");
        let b = QueryFingerprint::from_query_text("SELECT a FROM t WHERE x = 1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "SELECT a FROM t WHERE x = 1");
    }

    #[test]
    fn test_query_text_preferred_over_intent_and_message() {
        let intent = json!({"intent": "summarize"});
        let fp = QueryFingerprint::derive(
            Some("SELECT 1"),
            Some(&intent),
            Some("how many clicks?"),
        );
        assert_eq!(fp.as_str(), "SELECT 1");
    }

    #[test]
    fn test_intent_gets_default_scope() {
        for missing in [
            json!({"intent": "summarize"}),
            json!({"intent": "summarize", "scope": null}),
            json!({"intent": "summarize", "scope": ""}),
            json!({"intent": "summarize", "scope": []}),
        ] {
            let fp = QueryFingerprint::from_intent(&missing).unwrap();
            assert!(fp.as_str().contains(DEFAULT_SCOPE), "no default scope in {fp}");
        }

        let explicit = json!({"intent": "summarize", "scope": "by_app"});
        let fp = QueryFingerprint::from_intent(&explicit).unwrap();
        assert!(!fp.as_str().contains(DEFAULT_SCOPE));
    }

    #[test]
    fn test_numeric_strings_equal_numbers() {
        let a = json!({"intent": "filter", "limit": "300", "scope": "by_app"});
        let b = json!({"intent": "filter", "limit": 300, "scope": "by_app"});
        assert_eq!(
            QueryFingerprint::from_intent(&a),
            QueryFingerprint::from_intent(&b)
        );
    }

    #[test]
    fn test_nested_numeric_normalization() {
        let a = json!({"filters": {"hr": ["3", "14"]}, "intent": "filter"});
        let b = json!({"filters": {"hr": [3, 14]}, "intent": "filter"});
        assert_eq!(
            QueryFingerprint::from_intent(&a),
            QueryFingerprint::from_intent(&b)
        );
    }

    #[test]
    fn test_overlong_digit_string_stays_string_consistently() {
        let huge = "99999999999999999999999999";
        let a = json!({"id": huge, "intent": "filter"});
        let b = json!({"id": huge, "intent": "filter"});
        assert_eq!(
            QueryFingerprint::from_intent(&a),
            QueryFingerprint::from_intent(&b)
        );
    }

    #[test]
    fn test_empty_or_non_object_intent_unusable() {
        assert!(QueryFingerprint::from_intent(&json!({})).is_none());
        assert!(QueryFingerprint::from_intent(&json!("text")).is_none());
        assert!(QueryFingerprint::from_intent(&json!(42)).is_none());
    }

    #[test]
    fn test_message_fallback_and_empty_fingerprint() {
        let fp = QueryFingerprint::derive(None, None, Some("  total clicks  "));
        assert_eq!(fp.as_str(), "total clicks");
        assert!(fp.is_cacheable());

        let fp = QueryFingerprint::derive(None, None, None);
        assert!(!fp.is_cacheable());

        let fp = QueryFingerprint::derive(Some("   "), Some(&json!({})), Some(" "));
        assert!(!fp.is_cacheable());
    }

    proptest! {
        #[test]
        fn prop_key_order_never_affects_fingerprint(
            pairs in proptest::collection::vec(("[a-z]{1,8}", 0i64..10_000), 1..6)
        ) {
            let mut forward = serde_json::Map::new();
            for (k, v) in &pairs {
                forward.insert(k.clone(), json!(v));
            }
            let mut reversed = serde_json::Map::new();
            for (k, v) in pairs.iter().rev() {
                reversed.insert(k.clone(), json!(v));
            }
            prop_assert_eq!(
                QueryFingerprint::from_intent(&Value::Object(forward)),
                QueryFingerprint::from_intent(&Value::Object(reversed))
            );
        }

        #[test]
        fn prop_digit_string_equals_number(n in 0u32..1_000_000) {
            let as_string = json!({"intent": "filter", "limit": n.to_string()});
            let as_number = json!({"intent": "filter", "limit": n});
            prop_assert_eq!(
                QueryFingerprint::from_intent(&as_string),
                QueryFingerprint::from_intent(&as_number)
            );
        }
    }
}
