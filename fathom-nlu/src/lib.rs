//! FATHOM NLU - Collaborator Abstraction Layer
//!
//! Provider-agnostic traits for the black-box collaborators the pipeline
//! routes between: interpretation, query construction, summarization,
//! response shaping, and clarification. This crate defines the interfaces;
//! actual implementations (LLM-backed or otherwise) are user-supplied and
//! must be explicitly registered - no auto-discovery.
//!
//! Interpretation and query construction return *raw* JSON. The pipeline
//! decodes it into typed outcomes at the stage boundary, so a collaborator
//! that violates the contract surfaces as a turn-level diagnostic rather
//! than a crash.

use std::sync::Arc;

use async_trait::async_trait;
use fathom_core::{ExecutionResult, FathomError, FathomResult, NluError, ParsedIntent};
use serde_json::Value;

pub mod clarifier;

pub use clarifier::TemplateClarifier;

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Natural-language interpretation collaborator.
///
/// Returns raw JSON carrying a `status` field from
/// `{ok, clarification_needed, not_relevant, error}` plus status-specific
/// fields (`parsed_intent`, `missing_fields`, `message`).
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Interpret one user message into a structured intent payload.
    async fn interpret(&self, message: &str) -> FathomResult<Value>;
}

/// Query text synthesis collaborator.
///
/// Returns raw JSON carrying a `status` field from
/// `{ok, needs_clarification, invalid_fields, error}` plus status-specific
/// fields (`query_text`, `clarification_questions`, `invalid_fields`,
/// `message`).
#[async_trait]
pub trait QueryBuilder: Send + Sync {
    /// Translate a structured intent into executable query text.
    async fn build(&self, intent: &ParsedIntent) -> FathomResult<Value>;
}

/// Result summarization collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize execution results with respect to the original question.
    async fn summarize(&self, question: &str, execution: &ExecutionResult)
        -> FathomResult<String>;
}

/// Final response shaping collaborator.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Turn a summary into the user-facing answer text.
    async fn respond(
        &self,
        question: &str,
        summary: &str,
        execution: &ExecutionResult,
    ) -> FathomResult<String>;
}

/// Clarification collaborator.
///
/// Asks exactly one question, for the first missing field only.
#[async_trait]
pub trait Clarifier: Send + Sync {
    /// Produce one clarification question for the given missing fields.
    async fn clarify(&self, missing_fields: &[String]) -> FathomResult<String>;
}

// ============================================================================
// COLLABORATOR REGISTRY
// ============================================================================

/// Registry for pipeline collaborators.
///
/// # Example
/// ```ignore
/// let mut registry = CollaboratorRegistry::new();
/// registry.register_interpreter(Box::new(my_interpreter));
/// registry.register_query_builder(Box::new(my_builder));
///
/// let interpreter = registry.interpreter()?;
/// ```
#[derive(Default)]
pub struct CollaboratorRegistry {
    interpreter: Option<Arc<dyn Interpreter>>,
    query_builder: Option<Arc<dyn QueryBuilder>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    responder: Option<Arc<dyn Responder>>,
    clarifier: Option<Arc<dyn Clarifier>>,
}

impl CollaboratorRegistry {
    /// Create an empty registry. The template clarifier is NOT installed by
    /// default; call `with_template_clarifier` or register your own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the built-in deterministic clarifier.
    pub fn with_template_clarifier(mut self) -> Self {
        self.clarifier = Some(Arc::new(TemplateClarifier::new()));
        self
    }

    /// Register an interpretation collaborator, replacing any previous one.
    pub fn register_interpreter(&mut self, interpreter: Box<dyn Interpreter>) {
        self.interpreter = Some(Arc::from(interpreter));
    }

    /// Register a query construction collaborator, replacing any previous one.
    pub fn register_query_builder(&mut self, builder: Box<dyn QueryBuilder>) {
        self.query_builder = Some(Arc::from(builder));
    }

    /// Register a summarization collaborator, replacing any previous one.
    pub fn register_summarizer(&mut self, summarizer: Box<dyn Summarizer>) {
        self.summarizer = Some(Arc::from(summarizer));
    }

    /// Register a response collaborator, replacing any previous one.
    pub fn register_responder(&mut self, responder: Box<dyn Responder>) {
        self.responder = Some(Arc::from(responder));
    }

    /// Register a clarification collaborator, replacing any previous one.
    pub fn register_clarifier(&mut self, clarifier: Box<dyn Clarifier>) {
        self.clarifier = Some(Arc::from(clarifier));
    }

    /// Get the registered interpreter.
    pub fn interpreter(&self) -> FathomResult<Arc<dyn Interpreter>> {
        self.interpreter.clone().ok_or_else(|| not_configured("interpreter"))
    }

    /// Get the registered query builder.
    pub fn query_builder(&self) -> FathomResult<Arc<dyn QueryBuilder>> {
        self.query_builder
            .clone()
            .ok_or_else(|| not_configured("query_builder"))
    }

    /// Get the registered summarizer.
    pub fn summarizer(&self) -> FathomResult<Arc<dyn Summarizer>> {
        self.summarizer.clone().ok_or_else(|| not_configured("summarizer"))
    }

    /// Get the registered responder.
    pub fn responder(&self) -> FathomResult<Arc<dyn Responder>> {
        self.responder.clone().ok_or_else(|| not_configured("responder"))
    }

    /// Get the registered clarifier.
    pub fn clarifier(&self) -> FathomResult<Arc<dyn Clarifier>> {
        self.clarifier.clone().ok_or_else(|| not_configured("clarifier"))
    }
}

fn not_configured(collaborator: &str) -> FathomError {
    FathomError::Nlu(NluError::NotConfigured {
        collaborator: collaborator.to_string(),
    })
}
