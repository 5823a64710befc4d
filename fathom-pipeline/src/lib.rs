//! FATHOM Pipeline - Turn Orchestration
//!
//! Routes one user message through interpretation, query construction,
//! cached execution, summarization, and response shaping, or down the
//! anomaly side route, streaming user-facing events along the way.
//!
//! The orchestrator is the only component that routes; stages are pure
//! adapters over collaborators and the cache. Collaborator misbehavior
//! (output that violates the stage contract) ends the turn with a generic
//! diagnostic, never a panic.

pub mod anomaly;
pub mod events;
pub mod orchestrator;
pub mod stage;

pub use anomaly::{AnomalyDetectStage, AnomalyQueries, VisualizeStage};
pub use events::{event_channel, EventSink, TurnEvents};
pub use orchestrator::{PipelineConfig, PipelineOrchestrator, GENERIC_DIAGNOSTIC};
pub use stage::{
    BuildStage, ClarifyStage, ExecuteStage, InterpretStage, RespondStage, Stage, SummarizeStage,
};
