//! Query execution results and anomaly findings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row returned by the backing store.
///
/// Keys are column names. `serde_json`'s default map keeps keys sorted,
/// which also keeps serialized snapshots deterministic.
pub type ResultRow = Map<String, Value>;

/// The outcome of running a query, cached or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Rows in the order the store (or snapshot) produced them.
    pub rows: Vec<ResultRow>,
    /// The query text that was (or had been) executed.
    pub executed_query: String,
    /// Number of rows returned.
    pub row_count: usize,
    /// Whether the rows were served from a cached snapshot.
    pub from_cache: bool,
}

impl ExecutionResult {
    /// Build a result from freshly executed rows.
    pub fn fresh(rows: Vec<ResultRow>, executed_query: impl Into<String>) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            executed_query: executed_query.into(),
            row_count,
            from_cache: false,
        }
    }

    /// Build a result from a cached snapshot.
    pub fn cached(rows: Vec<ResultRow>, executed_query: impl Into<String>) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            executed_query: executed_query.into(),
            row_count,
            from_cache: true,
        }
    }
}

/// Findings of the anomaly detection side route.
///
/// Spike and drop rows come from two fixed detection queries run against the
/// backing store; each row describes one flagged interval.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFindings {
    /// Intervals with abnormally high activity.
    pub spike_rows: Vec<ResultRow>,
    /// Intervals with abnormally low activity.
    pub drop_rows: Vec<ResultRow>,
}

impl AnomalyFindings {
    /// Whether any anomaly was flagged.
    pub fn is_empty(&self) -> bool {
        self.spike_rows.is_empty() && self.drop_rows.is_empty()
    }

    /// One-line report of the findings.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No anomalies detected.".to_string();
        }
        let mut parts = Vec::new();
        if !self.spike_rows.is_empty() {
            parts.push(format!("click_spike: {} flagged", self.spike_rows.len()));
        }
        if !self.drop_rows.is_empty() {
            parts.push(format!("click_drop: {} flagged", self.drop_rows.len()));
        }
        parts.join(" | ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> ResultRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_execution_result_counts_rows() {
        let rows = vec![row(&[("a", json!(1))]), row(&[("a", json!(2))])];
        let result = ExecutionResult::fresh(rows, "SELECT a FROM t");
        assert_eq!(result.row_count, 2);
        assert!(!result.from_cache);

        let cached = ExecutionResult::cached(result.rows.clone(), "SELECT a FROM t");
        assert!(cached.from_cache);
        assert_eq!(cached.row_count, 2);
    }

    #[test]
    fn test_anomaly_summary() {
        let empty = AnomalyFindings::default();
        assert_eq!(empty.summary(), "No anomalies detected.");

        let findings = AnomalyFindings {
            spike_rows: vec![row(&[("hr", json!(13))])],
            drop_rows: vec![row(&[("hr", json!(3))]), row(&[("hr", json!(4))])],
        };
        assert_eq!(findings.summary(), "click_spike: 1 flagged | click_drop: 2 flagged");
    }
}
