//! User-facing turn events.
//!
//! The orchestrator emits these over a push channel in the order stages
//! produce them. Exactly one terminal event is produced per turn: an answer,
//! a clarification question, a diagnostic, or a rendered chart.

use serde::{Deserialize, Serialize};

// ============================================================================
// CHART PAYLOAD
// ============================================================================

/// One point in a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// X-axis label (hour, timestamp, or category).
    pub label: String,
    /// Y-axis value.
    pub value: f64,
}

/// A named series of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<ChartPoint>,
}

/// A renderable chart description for the anomaly visualization route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub series: Vec<ChartSeries>,
}

// ============================================================================
// TURN EVENTS
// ============================================================================

/// Events emitted to the caller during one pipeline turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// One clarification question; the turn stops and awaits the next input.
    ClarificationAsked { question: String },

    /// A user-visible message terminating the turn (upstream status or a
    /// stage contract violation).
    Diagnostic { message: String },

    /// The final answer for a successfully executed query.
    Answer {
        text: String,
        executed_query: String,
        row_count: usize,
        from_cache: bool,
    },

    /// Interim report from the anomaly detection route.
    AnomalyReport {
        summary: String,
        spike_count: usize,
        drop_count: usize,
    },

    /// Rendered chart terminating the anomaly route.
    ChartReady { chart: ChartSpec },
}

impl TurnEvent {
    /// Whether this event terminates the turn.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::AnomalyReport { .. })
    }
}
