//! Turn orchestration.
//!
//! The orchestrator owns the routing decision table: it runs stages in
//! order, inspects the typed outcomes they leave on the turn context, and
//! decides which stage (if any) runs next. Every turn ends with exactly one
//! terminal event unless the caller walked away mid-turn.

use std::sync::Arc;

use fathom_core::{BuildOutcome, FathomResult, InterpretOutcome, TurnContext, TurnEvent};
use fathom_nlu::CollaboratorRegistry;
use fathom_store::{CacheStore, QueryCache, QueryExecutor};

use crate::anomaly::{AnomalyDetectStage, AnomalyQueries, VisualizeStage};
use crate::events::{event_channel, EventSink, TurnEvents};
use crate::stage::{
    BuildStage, ClarifyStage, ExecuteStage, InterpretStage, RespondStage, Stage, SummarizeStage,
};

/// User-visible text for a turn killed by a stage contract violation. The
/// violating payload itself is only logged, never shown.
pub const GENERIC_DIAGNOSTIC: &str =
    "Something went wrong while processing your question. Please try again.";

/// Orchestrator configuration beyond the cache policy.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// The fixed detection query pair for the anomaly route.
    pub anomaly_queries: AnomalyQueries,
}

/// Runs one user message through the pipeline per turn.
pub struct PipelineOrchestrator<S: CacheStore> {
    interpret: InterpretStage,
    clarify: ClarifyStage,
    build: BuildStage,
    execute: ExecuteStage<S>,
    summarize: SummarizeStage,
    respond: RespondStage,
    anomaly_detect: AnomalyDetectStage,
    visualize: VisualizeStage,
}

impl<S: CacheStore> std::fmt::Debug for PipelineOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator").finish_non_exhaustive()
    }
}

impl<S: CacheStore> PipelineOrchestrator<S> {
    /// Wire an orchestrator from registered collaborators, a cache, and an
    /// executor. Fails immediately if any collaborator is missing; a turn
    /// never discovers an unconfigured registry halfway through.
    pub fn new(
        registry: &CollaboratorRegistry,
        cache: Arc<QueryCache<S>>,
        executor: Arc<dyn QueryExecutor>,
        config: PipelineConfig,
    ) -> FathomResult<Self> {
        Ok(Self {
            interpret: InterpretStage::new(registry.interpreter()?),
            clarify: ClarifyStage::new(registry.clarifier()?),
            build: BuildStage::new(registry.query_builder()?),
            execute: ExecuteStage::new(cache, Arc::clone(&executor)),
            summarize: SummarizeStage::new(registry.summarizer()?),
            respond: RespondStage::new(registry.responder()?),
            anomaly_detect: AnomalyDetectStage::new(executor, config.anomaly_queries),
            visualize: VisualizeStage,
        })
    }

    /// Run one turn, streaming events into `events`.
    ///
    /// Stage contract violations end the turn with a generic diagnostic and
    /// an `Ok` context; infrastructure failures (store, executor,
    /// collaborator transport) end it with a diagnostic and the error. A
    /// closed event channel means the caller is gone; no further stages run.
    pub async fn run_turn(&self, message: &str, events: &EventSink) -> FathomResult<TurnContext> {
        let mut ctx = TurnContext::new(message);
        tracing::info!(turn_id = %ctx.turn_id, "turn started");

        if !self.run_stage(&self.interpret, &mut ctx, events).await? {
            return Ok(ctx);
        }
        if events.is_closed() {
            return Ok(ctx);
        }

        let Some(outcome) = ctx.interpret.clone() else {
            // InterpretStage always records an outcome on success.
            events.emit(TurnEvent::Diagnostic {
                message: GENERIC_DIAGNOSTIC.to_string(),
            });
            return Ok(ctx);
        };

        match outcome {
            InterpretOutcome::ClarificationNeeded { .. } => {
                self.run_stage(&self.clarify, &mut ctx, events).await?;
                Ok(ctx)
            }
            InterpretOutcome::NotRelevant { message } | InterpretOutcome::Error { message } => {
                events.emit(TurnEvent::Diagnostic {
                    message: message.unwrap_or_else(|| GENERIC_DIAGNOSTIC.to_string()),
                });
                Ok(ctx)
            }
            InterpretOutcome::Ok { .. } => {
                let anomaly_route = ctx
                    .parsed_intent
                    .as_ref()
                    .is_some_and(|intent| intent.is_anomaly());
                if anomaly_route {
                    self.run_anomaly_route(ctx, events).await
                } else {
                    self.run_answer_route(ctx, events).await
                }
            }
        }
    }

    /// Run one turn and collect every event it produced.
    ///
    /// The channel is unbounded, so buffering the whole turn before draining
    /// is safe.
    pub async fn run_collected(&self, message: &str) -> FathomResult<(TurnContext, Vec<TurnEvent>)> {
        let (sink, events) = event_channel();
        let ctx = self.run_turn(message, &sink).await?;
        drop(sink);
        Ok((ctx, events.collect().await))
    }

    /// Create a connected event pair for callers that stream turns.
    pub fn event_channel() -> (EventSink, TurnEvents) {
        event_channel()
    }

    async fn run_answer_route(
        &self,
        mut ctx: TurnContext,
        events: &EventSink,
    ) -> FathomResult<TurnContext> {
        if !self.run_stage(&self.build, &mut ctx, events).await? {
            return Ok(ctx);
        }
        if events.is_closed() {
            return Ok(ctx);
        }

        let Some(build) = ctx.build.clone() else {
            events.emit(TurnEvent::Diagnostic {
                message: GENERIC_DIAGNOSTIC.to_string(),
            });
            return Ok(ctx);
        };

        match build {
            BuildOutcome::Ok { .. } => {}
            BuildOutcome::NeedsClarification {
                message,
                clarification_questions,
            } => {
                // All of the builder's questions go out as one combined ask.
                let mut parts: Vec<String> = Vec::new();
                parts.extend(message);
                parts.extend(clarification_questions);
                let question = if parts.is_empty() {
                    GENERIC_DIAGNOSTIC.to_string()
                } else {
                    parts.join("\n")
                };
                events.emit(TurnEvent::ClarificationAsked { question });
                return Ok(ctx);
            }
            BuildOutcome::InvalidFields {
                message,
                invalid_fields,
            } => {
                let mut text = message.unwrap_or_else(|| {
                    "The question references fields that are not available.".to_string()
                });
                if !invalid_fields.is_empty() {
                    text = format!("{text} Invalid fields: {}.", invalid_fields.join(", "));
                }
                events.emit(TurnEvent::Diagnostic { message: text });
                return Ok(ctx);
            }
            BuildOutcome::Error { message } => {
                events.emit(TurnEvent::Diagnostic {
                    message: message.unwrap_or_else(|| GENERIC_DIAGNOSTIC.to_string()),
                });
                return Ok(ctx);
            }
        }

        for stage in [
            &self.execute as &dyn Stage,
            &self.summarize,
            &self.respond,
        ] {
            if events.is_closed() {
                return Ok(ctx);
            }
            if !self.run_stage(stage, &mut ctx, events).await? {
                return Ok(ctx);
            }
        }
        Ok(ctx)
    }

    async fn run_anomaly_route(
        &self,
        mut ctx: TurnContext,
        events: &EventSink,
    ) -> FathomResult<TurnContext> {
        if !self.run_stage(&self.anomaly_detect, &mut ctx, events).await? {
            return Ok(ctx);
        }
        if events.is_closed() {
            return Ok(ctx);
        }
        self.run_stage(&self.visualize, &mut ctx, events).await?;
        Ok(ctx)
    }

    /// Run one stage. `Ok(true)` means continue; `Ok(false)` means the turn
    /// ended on a contract violation (already reported as a diagnostic).
    async fn run_stage(
        &self,
        stage: &dyn Stage,
        ctx: &mut TurnContext,
        events: &EventSink,
    ) -> FathomResult<bool> {
        match stage.run(ctx, events).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_contract_violation() => {
                tracing::warn!(
                    turn_id = %ctx.turn_id,
                    stage = stage.name(),
                    error = %err,
                    "stage contract violation, ending turn"
                );
                events.emit(TurnEvent::Diagnostic {
                    message: GENERIC_DIAGNOSTIC.to_string(),
                });
                Ok(false)
            }
            Err(err) => {
                tracing::error!(
                    turn_id = %ctx.turn_id,
                    stage = stage.name(),
                    error = %err,
                    "stage failed"
                );
                events.emit(TurnEvent::Diagnostic {
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
