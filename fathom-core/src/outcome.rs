//! Stage outcome types.
//!
//! Each branching stage communicates with the orchestrator through a tagged
//! union, one variant per status. Collaborators return raw JSON; the stage
//! adapter decodes it into the union at the stage boundary, so the
//! orchestrator never inspects loosely-typed output. A value that fails to
//! decode is a stage contract violation, fatal to the turn but never to the
//! process.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{stage_contract, FathomResult};
use crate::intent::ParsedIntent;

// ============================================================================
// INTERPRET STAGE
// ============================================================================

/// Outcome of the interpretation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InterpretOutcome {
    /// The request was understood and a structured intent extracted.
    Ok {
        parsed_intent: ParsedIntent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The request is incomplete; the named fields need clarification.
    ClarificationNeeded {
        #[serde(default)]
        missing_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The request is outside the system's domain.
    NotRelevant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Interpretation failed outright.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl InterpretOutcome {
    /// Decode a raw collaborator value, mapping failure to a stage contract
    /// violation.
    pub fn from_value(value: Value) -> FathomResult<Self> {
        serde_json::from_value(value).map_err(|e| stage_contract("interpret", e.to_string()))
    }

    /// The user-facing message attached to this outcome, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { message, .. }
            | Self::ClarificationNeeded { message, .. }
            | Self::NotRelevant { message }
            | Self::Error { message } => message.as_deref(),
        }
    }
}

// ============================================================================
// BUILD STAGE
// ============================================================================

/// Outcome of the query construction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    /// Executable query text is ready to run.
    Ok {
        #[serde(alias = "sql")]
        query_text: String,
    },

    /// The intent could not be translated without more input.
    NeedsClarification {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        clarification_questions: Vec<String>,
    },

    /// The intent references fields the schema does not have.
    InvalidFields {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        invalid_fields: Vec<String>,
    },

    /// Query construction failed outright.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl BuildOutcome {
    /// Decode a raw collaborator value, mapping failure to a stage contract
    /// violation.
    pub fn from_value(value: Value) -> FathomResult<Self> {
        serde_json::from_value(value).map_err(|e| stage_contract("build", e.to_string()))
    }

    /// The executable query text, if the build succeeded.
    pub fn query_text(&self) -> Option<&str> {
        match self {
            Self::Ok { query_text } => Some(query_text),
            _ => None,
        }
    }
}
