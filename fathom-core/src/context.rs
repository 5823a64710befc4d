//! Per-turn pipeline context.
//!
//! Replaces the free-form session dictionary with named, typed slots. The
//! orchestrator owns the context for one turn; stages write their outcomes
//! into it and downstream stages read what they need. It is discarded (or
//! persisted by an external session store) when the turn ends.

use serde::{Deserialize, Serialize};

use crate::execution::{AnomalyFindings, ExecutionResult};
use crate::intent::ParsedIntent;
use crate::outcome::{BuildOutcome, InterpretOutcome};
use crate::{new_turn_id, Timestamp, TurnId};

/// Mutable state threaded through one pipeline turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    /// Unique identifier for this turn.
    pub turn_id: TurnId,
    /// When the turn started.
    pub started_at: Timestamp,
    /// The raw user message that initiated the turn.
    pub user_message: String,

    /// Interpretation stage outcome.
    pub interpret: Option<InterpretOutcome>,
    /// Structured intent, populated when interpretation succeeds.
    pub parsed_intent: Option<ParsedIntent>,
    /// Fields the interpreter flagged as missing, copied here for the
    /// clarification stage.
    pub missing_fields: Vec<String>,

    /// Build stage outcome.
    pub build: Option<BuildOutcome>,
    /// Executable query text, populated when the build succeeds.
    pub query_text: Option<String>,

    /// Execution stage result.
    pub execution: Option<ExecutionResult>,
    /// Summarization stage output.
    pub summary: Option<String>,
    /// Final response text.
    pub response: Option<String>,

    /// Anomaly route findings.
    pub anomaly: Option<AnomalyFindings>,
}

impl TurnContext {
    /// Create a fresh context for one user message.
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            turn_id: new_turn_id(),
            started_at: chrono::Utc::now(),
            user_message: user_message.into(),
            interpret: None,
            parsed_intent: None,
            missing_fields: Vec::new(),
            build: None,
            query_text: None,
            execution: None,
            summary: None,
            response: None,
            anomaly: None,
        }
    }
}
