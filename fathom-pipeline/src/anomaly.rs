//! Anomaly detection side route.
//!
//! Anomaly-flavored intents bypass query construction entirely: two fixed
//! detection queries (spike and drop) run against the backing store, their
//! flagged intervals are reported, and a chart description is emitted for
//! rendering. The queries are configuration, not collaborator output.

use std::sync::Arc;

use async_trait::async_trait;
use fathom_core::{
    stage_contract, AnomalyFindings, ChartPoint, ChartSeries, ChartSpec, FathomResult, ResultRow,
    TurnContext, TurnEvent,
};
use fathom_store::QueryExecutor;
use serde_json::Value;

use crate::events::EventSink;
use crate::stage::Stage;

/// Hourly click volumes more than three deviations above the trailing mean.
const DEFAULT_SPIKE_QUERY: &str = "\
SELECT hr, total_events
FROM (
  SELECT
    TIMESTAMP_TRUNC(event_time, HOUR) AS hr,
    COUNT(*) AS total_events,
    AVG(COUNT(*)) OVER w AS avg_events,
    STDDEV(COUNT(*)) OVER w AS stddev_events
  FROM events.clicks
  WHERE event_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 7 DAY)
  GROUP BY hr
  WINDOW w AS (ORDER BY TIMESTAMP_TRUNC(event_time, HOUR) ROWS BETWEEN 24 PRECEDING AND 1 PRECEDING)
)
WHERE total_events > avg_events + 3 * stddev_events
ORDER BY hr";

/// Hourly click volumes more than three deviations below the trailing mean.
const DEFAULT_DROP_QUERY: &str = "\
SELECT hr, total_events
FROM (
  SELECT
    TIMESTAMP_TRUNC(event_time, HOUR) AS hr,
    COUNT(*) AS total_events,
    AVG(COUNT(*)) OVER w AS avg_events,
    STDDEV(COUNT(*)) OVER w AS stddev_events
  FROM events.clicks
  WHERE event_time >= TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL 7 DAY)
  GROUP BY hr
  WINDOW w AS (ORDER BY TIMESTAMP_TRUNC(event_time, HOUR) ROWS BETWEEN 24 PRECEDING AND 1 PRECEDING)
)
WHERE total_events < avg_events - 3 * stddev_events
ORDER BY hr";

/// The fixed spike/drop query pair for the anomaly route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyQueries {
    pub spike_query: String,
    pub drop_query: String,
}

impl Default for AnomalyQueries {
    fn default() -> Self {
        Self {
            spike_query: DEFAULT_SPIKE_QUERY.to_string(),
            drop_query: DEFAULT_DROP_QUERY.to_string(),
        }
    }
}

// ============================================================================
// DETECT
// ============================================================================

/// Runs both detection queries and reports the findings.
pub struct AnomalyDetectStage {
    executor: Arc<dyn QueryExecutor>,
    queries: AnomalyQueries,
}

impl AnomalyDetectStage {
    pub fn new(executor: Arc<dyn QueryExecutor>, queries: AnomalyQueries) -> Self {
        Self { executor, queries }
    }
}

#[async_trait]
impl Stage for AnomalyDetectStage {
    fn name(&self) -> &'static str {
        "anomaly_detect"
    }

    async fn run(&self, ctx: &mut TurnContext, events: &EventSink) -> FathomResult<()> {
        let spike_rows = self.executor.execute(&self.queries.spike_query).await?;
        let drop_rows = self.executor.execute(&self.queries.drop_query).await?;
        let findings = AnomalyFindings { spike_rows, drop_rows };

        tracing::info!(
            spikes = findings.spike_rows.len(),
            drops = findings.drop_rows.len(),
            "anomaly detection complete"
        );
        events.emit(TurnEvent::AnomalyReport {
            summary: findings.summary(),
            spike_count: findings.spike_rows.len(),
            drop_count: findings.drop_rows.len(),
        });
        ctx.anomaly = Some(findings);
        Ok(())
    }
}

// ============================================================================
// VISUALIZE
// ============================================================================

/// Turns the findings into a chart description and emits it.
pub struct VisualizeStage;

#[async_trait]
impl Stage for VisualizeStage {
    fn name(&self) -> &'static str {
        "visualize"
    }

    async fn run(&self, ctx: &mut TurnContext, events: &EventSink) -> FathomResult<()> {
        let findings = ctx
            .anomaly
            .as_ref()
            .ok_or_else(|| stage_contract("visualize", "no anomaly findings on the turn context"))?;
        events.emit(TurnEvent::ChartReady {
            chart: chart_from_findings(findings),
        });
        Ok(())
    }
}

/// Build the anomaly chart: one series per non-empty finding set.
fn chart_from_findings(findings: &AnomalyFindings) -> ChartSpec {
    let mut series = Vec::new();
    if !findings.spike_rows.is_empty() {
        series.push(ChartSeries {
            name: "spikes".to_string(),
            points: points_from_rows(&findings.spike_rows),
        });
    }
    if !findings.drop_rows.is_empty() {
        series.push(ChartSeries {
            name: "drops".to_string(),
            points: points_from_rows(&findings.drop_rows),
        });
    }
    ChartSpec {
        title: "Click volume anomalies".to_string(),
        series,
    }
}

fn points_from_rows(rows: &[ResultRow]) -> Vec<ChartPoint> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| ChartPoint {
            label: label_for_row(row).unwrap_or_else(|| i.to_string()),
            value: value_for_row(row).unwrap_or(0.0),
        })
        .collect()
}

const LABEL_COLUMNS: [&str; 4] = ["hr", "event_time", "hour", "label"];
const VALUE_COLUMNS: [&str; 3] = ["total_events", "value", "count"];

fn label_for_row(row: &ResultRow) -> Option<String> {
    for column in LABEL_COLUMNS {
        match row.get(column) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn value_for_row(row: &ResultRow) -> Option<f64> {
    for column in VALUE_COLUMNS {
        if let Some(value) = row.get(column).and_then(Value::as_f64) {
            return Some(value);
        }
    }
    None
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
    fn test_chart_has_one_series_per_finding_set() {
        let findings = AnomalyFindings {
            spike_rows: vec![row(&[("hr", json!("2026-08-24T13:00:00Z")), ("total_events", json!(9120))])],
            drop_rows: Vec::new(),
        };
        let chart = chart_from_findings(&findings);
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].name, "spikes");
        assert_eq!(chart.series[0].points[0].label, "2026-08-24T13:00:00Z");
        assert_eq!(chart.series[0].points[0].value, 9120.0);
    }

    #[test]
    fn test_chart_falls_back_to_row_index() {
        let findings = AnomalyFindings {
            spike_rows: Vec::new(),
            drop_rows: vec![row(&[("unexpected", json!("x"))]), row(&[("unexpected", json!("y"))])],
        };
        let chart = chart_from_findings(&findings);
        assert_eq!(chart.series[0].points[0].label, "0");
        assert_eq!(chart.series[0].points[1].label, "1");
        assert_eq!(chart.series[0].points[0].value, 0.0);
    }

    #[test]
    fn test_empty_findings_make_an_empty_chart() {
        let chart = chart_from_findings(&AnomalyFindings::default());
        assert!(chart.series.is_empty());
    }
}
