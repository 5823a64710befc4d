//! Stage trait and the answer-route stage adapters.
//!
//! Each stage reads what it needs from the turn context, calls its
//! collaborator (or the cache), writes its output back into the context,
//! and emits events where the flow calls for them. Routing between stages
//! belongs to the orchestrator; stages never invoke each other.

use std::sync::Arc;

use async_trait::async_trait;
use fathom_core::{
    stage_contract, BuildOutcome, ExecutionResult, FathomResult, InterpretOutcome, TurnContext,
    TurnEvent,
};
use fathom_nlu::{Clarifier, Interpreter, QueryBuilder, Responder, Summarizer};
use fathom_store::{CacheStore, QueryCache, QueryExecutor, QueryFingerprint};

use crate::events::EventSink;

/// One pipeline stage.
///
/// A stage's contract failures (collaborator output that does not decode)
/// surface as contract-violation errors; the orchestrator downgrades those
/// to a turn-level diagnostic. Infrastructure failures propagate as-is.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name used in logs.
    fn name(&self) -> &'static str;

    /// Run the stage against the turn context.
    async fn run(&self, ctx: &mut TurnContext, events: &EventSink) -> FathomResult<()>;
}

// ============================================================================
// INTERPRET
// ============================================================================

/// Decodes the user message into a typed interpretation outcome.
pub struct InterpretStage {
    interpreter: Arc<dyn Interpreter>,
}

impl InterpretStage {
    pub fn new(interpreter: Arc<dyn Interpreter>) -> Self {
        Self { interpreter }
    }
}

#[async_trait]
impl Stage for InterpretStage {
    fn name(&self) -> &'static str {
        "interpret"
    }

    async fn run(&self, ctx: &mut TurnContext, _events: &EventSink) -> FathomResult<()> {
        let raw = self.interpreter.interpret(&ctx.user_message).await?;
        let outcome = InterpretOutcome::from_value(raw)?;
        if let InterpretOutcome::Ok { parsed_intent, .. } = &outcome {
            ctx.parsed_intent = Some(parsed_intent.clone());
        }
        if let InterpretOutcome::ClarificationNeeded { missing_fields, .. } = &outcome {
            ctx.missing_fields = missing_fields.clone();
        }
        ctx.interpret = Some(outcome);
        Ok(())
    }
}

// ============================================================================
// CLARIFY
// ============================================================================

/// Asks one clarification question for the missing fields.
pub struct ClarifyStage {
    clarifier: Arc<dyn Clarifier>,
}

impl ClarifyStage {
    pub fn new(clarifier: Arc<dyn Clarifier>) -> Self {
        Self { clarifier }
    }
}

#[async_trait]
impl Stage for ClarifyStage {
    fn name(&self) -> &'static str {
        "clarify"
    }

    async fn run(&self, ctx: &mut TurnContext, events: &EventSink) -> FathomResult<()> {
        let question = self.clarifier.clarify(&ctx.missing_fields).await?;
        events.emit(TurnEvent::ClarificationAsked { question });
        Ok(())
    }
}

// ============================================================================
// BUILD
// ============================================================================

/// Translates the parsed intent into executable query text.
pub struct BuildStage {
    builder: Arc<dyn QueryBuilder>,
}

impl BuildStage {
    pub fn new(builder: Arc<dyn QueryBuilder>) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl Stage for BuildStage {
    fn name(&self) -> &'static str {
        "build"
    }

    async fn run(&self, ctx: &mut TurnContext, _events: &EventSink) -> FathomResult<()> {
        let intent = ctx
            .parsed_intent
            .clone()
            .ok_or_else(|| stage_contract("build", "no parsed intent on the turn context"))?;
        let raw = self.builder.build(&intent).await?;
        let outcome = BuildOutcome::from_value(raw)?;
        if let Some(query_text) = outcome.query_text() {
            ctx.query_text = Some(query_text.to_string());
        }
        ctx.build = Some(outcome);
        Ok(())
    }
}

// ============================================================================
// EXECUTE
// ============================================================================

/// Runs the built query through the cache policy.
pub struct ExecuteStage<S: CacheStore> {
    cache: Arc<QueryCache<S>>,
    executor: Arc<dyn QueryExecutor>,
}

impl<S: CacheStore> ExecuteStage<S> {
    pub fn new(cache: Arc<QueryCache<S>>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { cache, executor }
    }
}

#[async_trait]
impl<S: CacheStore> Stage for ExecuteStage<S> {
    fn name(&self) -> &'static str {
        "execute"
    }

    async fn run(&self, ctx: &mut TurnContext, _events: &EventSink) -> FathomResult<()> {
        let query_text = ctx
            .query_text
            .clone()
            .ok_or_else(|| stage_contract("execute", "no query text on the turn context"))?;

        let fingerprint = QueryFingerprint::derive(
            Some(&query_text),
            ctx.parsed_intent.as_ref().map(|i| i.as_value()),
            Some(&ctx.user_message),
        );

        let (rows, from_cache) = if fingerprint.is_cacheable() {
            self.cache
                .run_with_cache(&query_text, &fingerprint, self.executor.as_ref())
                .await?
        } else {
            tracing::debug!("request is not cacheable, executing directly");
            (self.executor.execute(&query_text).await?, false)
        };

        ctx.execution = Some(if from_cache {
            ExecutionResult::cached(rows, query_text)
        } else {
            ExecutionResult::fresh(rows, query_text)
        });
        Ok(())
    }
}

// ============================================================================
// SUMMARIZE
// ============================================================================

/// Summarizes execution results with respect to the original question.
pub struct SummarizeStage {
    summarizer: Arc<dyn Summarizer>,
}

impl SummarizeStage {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }
}

#[async_trait]
impl Stage for SummarizeStage {
    fn name(&self) -> &'static str {
        "summarize"
    }

    async fn run(&self, ctx: &mut TurnContext, _events: &EventSink) -> FathomResult<()> {
        let execution = ctx
            .execution
            .as_ref()
            .ok_or_else(|| stage_contract("summarize", "no execution result on the turn context"))?;
        let summary = self.summarizer.summarize(&ctx.user_message, execution).await?;
        ctx.summary = Some(summary);
        Ok(())
    }
}

// ============================================================================
// RESPOND
// ============================================================================

/// Shapes the final answer and emits the terminal answer event.
pub struct RespondStage {
    responder: Arc<dyn Responder>,
}

impl RespondStage {
    pub fn new(responder: Arc<dyn Responder>) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl Stage for RespondStage {
    fn name(&self) -> &'static str {
        "respond"
    }

    async fn run(&self, ctx: &mut TurnContext, events: &EventSink) -> FathomResult<()> {
        let execution = ctx
            .execution
            .as_ref()
            .ok_or_else(|| stage_contract("respond", "no execution result on the turn context"))?;
        let summary = ctx
            .summary
            .as_deref()
            .ok_or_else(|| stage_contract("respond", "no summary on the turn context"))?;

        let text = self
            .responder
            .respond(&ctx.user_message, summary, execution)
            .await?;
        events.emit(TurnEvent::Answer {
            text: text.clone(),
            executed_query: execution.executed_query.clone(),
            row_count: execution.row_count,
            from_cache: execution.from_cache,
        });
        ctx.response = Some(text);
        Ok(())
    }
}
