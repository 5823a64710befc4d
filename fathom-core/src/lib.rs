//! FATHOM Core - Pipeline Data Types
//!
//! Pure data structures shared by every other crate: stage outcomes, the
//! per-turn context, user-facing events, and the error taxonomy.
//! This crate contains ONLY data types - no pipeline or cache logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod context;
pub mod error;
pub mod event;
pub mod execution;
pub mod intent;
pub mod outcome;

pub use context::TurnContext;
pub use error::{
    stage_contract, CacheError, ExecutorError, FathomError, FathomResult, NluError, PipelineError,
};
pub use event::{ChartPoint, ChartSeries, ChartSpec, TurnEvent};
pub use execution::{AnomalyFindings, ExecutionResult, ResultRow};
pub use intent::ParsedIntent;
pub use outcome::{BuildOutcome, InterpretOutcome};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Turn identifier using UUIDv7 for timestamp-sortable IDs.
pub type TurnId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 TurnId (timestamp-sortable).
pub fn new_turn_id() -> TurnId {
    Uuid::now_v7()
}
