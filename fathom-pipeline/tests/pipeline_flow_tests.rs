//! End-to-end routing tests over mock collaborators and an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use fathom_core::{FathomError, NluError, TurnEvent};
use fathom_nlu::CollaboratorRegistry;
use fathom_pipeline::{PipelineConfig, PipelineOrchestrator, GENERIC_DIAGNOSTIC};
use fathom_store::{CacheConfig, MemoryCacheStore, QueryCache};
use fathom_test_utils::{
    build_invalid_fields, build_needs_clarification, build_ok, click_rows, garbage,
    interpret_clarification, interpret_not_relevant, interpret_ok, CountingExecutor,
    EchoResponder, EchoSummarizer, MockInterpreter, MockQueryBuilder,
};
use serde_json::{json, Value};

fn registry(interpret_payload: Value, build_payload: Value) -> CollaboratorRegistry {
    let mut registry = CollaboratorRegistry::new().with_template_clarifier();
    registry.register_interpreter(Box::new(MockInterpreter::returning(interpret_payload)));
    registry.register_query_builder(Box::new(MockQueryBuilder::returning(build_payload)));
    registry.register_summarizer(Box::new(EchoSummarizer::new()));
    registry.register_responder(Box::new(EchoResponder::new()));
    registry
}

fn orchestrator(
    registry: &CollaboratorRegistry,
    executor: Arc<CountingExecutor>,
    config: CacheConfig,
) -> PipelineOrchestrator<MemoryCacheStore> {
    let cache = Arc::new(QueryCache::new(MemoryCacheStore::new(), config));
    PipelineOrchestrator::new(registry, cache, executor, PipelineConfig::default()).unwrap()
}

#[tokio::test]
async fn test_happy_path_ends_with_one_answer() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate", "metric": "clicks"})),
        build_ok("SELECT app_id, count(*) AS clicks FROM t GROUP BY app_id"),
    );
    let executor = Arc::new(CountingExecutor::returning(click_rows()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (ctx, events) = pipeline.run_collected("clicks by app?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::Answer {
            text,
            row_count,
            from_cache,
            ..
        } => {
            assert_eq!(text, "2 rows for: clicks by app?");
            assert_eq!(*row_count, 2);
            assert!(!from_cache);
        }
        other => panic!("expected an answer, got {other:?}"),
    }
    assert_eq!(ctx.response.as_deref(), Some("2 rows for: clicks by app?"));
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_clarification_stops_before_build() {
    let registry = registry(
        interpret_clarification(&["scope"]),
        build_ok("SELECT 1"),
    );
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (ctx, events) = pipeline.run_collected("how are clicks doing?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::ClarificationAsked { question } => assert!(!question.is_empty()),
        other => panic!("expected a clarification, got {other:?}"),
    }
    assert!(ctx.build.is_none());
    assert!(ctx.execution.is_none());
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_not_relevant_emits_its_message() {
    let registry = registry(
        interpret_not_relevant("I can only answer questions about click analytics."),
        build_ok("SELECT 1"),
    );
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (_, events) = pipeline.run_collected("what's the weather?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::Diagnostic { message } => {
            assert_eq!(message, "I can only answer questions about click analytics.");
        }
        other => panic!("expected a diagnostic, got {other:?}"),
    }
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_garbage_interpretation_is_a_generic_diagnostic() {
    let registry = registry(garbage(), build_ok("SELECT 1"));
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (_, events) = pipeline.run_collected("clicks?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::Diagnostic { message } => assert_eq!(message, GENERIC_DIAGNOSTIC),
        other => panic!("expected a diagnostic, got {other:?}"),
    }
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_builder_questions_combine_into_one_ask() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate"})),
        build_needs_clarification(
            "I need more detail.",
            &["Which date range?", "Which app?"],
        ),
    );
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (_, events) = pipeline.run_collected("clicks?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::ClarificationAsked { question } => {
            assert!(question.contains("I need more detail."));
            assert!(question.contains("Which date range?"));
            assert!(question.contains("Which app?"));
        }
        other => panic!("expected a clarification, got {other:?}"),
    }
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_invalid_fields_are_all_named() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate"})),
        build_invalid_fields("Unknown columns.", &["installs", "revenue"]),
    );
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (_, events) = pipeline.run_collected("installs and revenue?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::Diagnostic { message } => {
            assert!(message.contains("installs"));
            assert!(message.contains("revenue"));
        }
        other => panic!("expected a diagnostic, got {other:?}"),
    }
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_garbage_build_is_a_generic_diagnostic() {
    let registry = registry(interpret_ok(json!({"intent": "aggregate"})), garbage());
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (_, events) = pipeline.run_collected("clicks?").await.unwrap();

    assert_eq!(events.len(), 1);
    match &events[0] {
        TurnEvent::Diagnostic { message } => assert_eq!(message, GENERIC_DIAGNOSTIC),
        other => panic!("expected a diagnostic, got {other:?}"),
    }
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_anomaly_route_skips_build_and_renders_a_chart() {
    let mut registry = CollaboratorRegistry::new().with_template_clarifier();
    registry.register_interpreter(Box::new(MockInterpreter::returning(interpret_ok(
        json!({"intent": "anomaly_scan"}),
    ))));
    let builder = Arc::new(MockQueryBuilder::returning(build_ok("SELECT 1")));
    struct SharedBuilder(Arc<MockQueryBuilder>);
    #[async_trait::async_trait]
    impl fathom_nlu::QueryBuilder for SharedBuilder {
        async fn build(
            &self,
            intent: &fathom_core::ParsedIntent,
        ) -> fathom_core::FathomResult<Value> {
            self.0.build(intent).await
        }
    }
    registry.register_query_builder(Box::new(SharedBuilder(Arc::clone(&builder))));
    registry.register_summarizer(Box::new(EchoSummarizer::new()));
    registry.register_responder(Box::new(EchoResponder::new()));

    let executor = Arc::new(CountingExecutor::returning(vec![fathom_test_utils::row(&[
        ("hr", json!("2026-08-24T13:00:00Z")),
        ("total_events", json!(9120)),
    ])]));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (ctx, events) = pipeline.run_collected("anything unusual lately?").await.unwrap();

    assert_eq!(events.len(), 2);
    match &events[0] {
        TurnEvent::AnomalyReport {
            spike_count,
            drop_count,
            ..
        } => {
            assert_eq!(*spike_count, 1);
            assert_eq!(*drop_count, 1);
        }
        other => panic!("expected an anomaly report, got {other:?}"),
    }
    match &events[1] {
        TurnEvent::ChartReady { chart } => assert_eq!(chart.series.len(), 2),
        other => panic!("expected a chart, got {other:?}"),
    }
    // One detection query each for spikes and drops; no built query.
    assert_eq!(executor.calls(), 2);
    assert_eq!(builder.calls(), 0);
    assert!(ctx.anomaly.is_some());
    assert!(ctx.build.is_none());
}

#[tokio::test]
async fn test_repeated_question_is_served_from_cache_on_the_fourth_ask() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate", "metric": "clicks"})),
        build_ok("SELECT app_id, count(*) AS clicks FROM t GROUP BY app_id"),
    );
    let executor = Arc::new(CountingExecutor::returning(click_rows()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let mut answers = Vec::new();
    for _ in 0..4 {
        let (_, events) = pipeline.run_collected("clicks by app?").await.unwrap();
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap() {
            TurnEvent::Answer {
                text,
                from_cache,
                row_count,
                ..
            } => answers.push((text, from_cache, row_count)),
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    // Warm-up executes twice, the third ask seeds the snapshot, the fourth
    // is served without touching the store.
    assert_eq!(executor.calls(), 3);
    assert!(!answers[0].1);
    assert!(!answers[1].1);
    assert!(!answers[2].1);
    assert!(answers[3].1);
    assert_eq!(answers[3].2, answers[2].2);
    assert_eq!(answers[3].0, answers[2].0);
}

#[tokio::test]
async fn test_expired_snapshot_is_recomputed() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate", "metric": "clicks"})),
        build_ok("SELECT count(*) FROM t"),
    );
    let executor = Arc::new(CountingExecutor::returning(click_rows()));
    let config = CacheConfig::new().with_ttl(Duration::from_millis(40));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), config);

    for _ in 0..4 {
        pipeline.run_collected("total clicks?").await.unwrap();
    }
    assert_eq!(executor.calls(), 3);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let (_, events) = pipeline.run_collected("total clicks?").await.unwrap();
    match &events[0] {
        TurnEvent::Answer { from_cache, .. } => assert!(!from_cache),
        other => panic!("expected an answer, got {other:?}"),
    }
    assert_eq!(executor.calls(), 4);
}

#[tokio::test]
async fn test_executor_failure_ends_the_turn_with_an_error() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate"})),
        build_ok("SELECT broken FROM t"),
    );
    let executor = Arc::new(CountingExecutor::failing("column broken does not exist"));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (sink, events) = PipelineOrchestrator::<MemoryCacheStore>::event_channel();
    let result = pipeline.run_turn("broken?", &sink).await;
    drop(sink);

    assert!(result.is_err());
    let collected = events.collect().await;
    assert_eq!(collected.len(), 1);
    match &collected[0] {
        TurnEvent::Diagnostic { message } => {
            assert!(message.contains("column broken does not exist"));
        }
        other => panic!("expected a diagnostic, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dropped_receiver_stops_the_turn() {
    let registry = registry(
        interpret_ok(json!({"intent": "aggregate"})),
        build_ok("SELECT 1"),
    );
    let executor = Arc::new(CountingExecutor::returning(click_rows()));
    let pipeline = orchestrator(&registry, Arc::clone(&executor), CacheConfig::default());

    let (sink, events) = PipelineOrchestrator::<MemoryCacheStore>::event_channel();
    drop(events);

    let ctx = pipeline.run_turn("clicks?", &sink).await.unwrap();
    // Interpretation ran, but nothing past the first closed-channel check.
    assert!(ctx.interpret.is_some());
    assert!(ctx.build.is_none());
    assert_eq!(executor.calls(), 0);
}

#[test]
fn test_missing_collaborator_fails_construction() {
    let registry = CollaboratorRegistry::new();
    let cache = Arc::new(QueryCache::with_defaults(MemoryCacheStore::new()));
    let executor = Arc::new(CountingExecutor::returning(Vec::new()));
    let err = PipelineOrchestrator::new(
        &registry,
        cache,
        executor,
        PipelineConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        FathomError::Nlu(NluError::NotConfigured { .. })
    ));
}
