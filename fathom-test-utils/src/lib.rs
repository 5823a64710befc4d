//! Shared mock collaborators and fixtures for FATHOM tests.
//!
//! The mocks return scripted payloads and count invocations; tests assert
//! routing and cache behavior against those counters. Nothing here touches
//! the network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fathom_core::{
    ExecutionResult, ExecutorError, FathomError, FathomResult, ParsedIntent, ResultRow,
};
use fathom_nlu::{Interpreter, QueryBuilder, Responder, Summarizer};
use fathom_store::QueryExecutor;
use serde_json::{json, Value};

// ============================================================================
// PAYLOAD BUILDERS
// ============================================================================

/// An `ok` interpretation payload carrying the given intent.
pub fn interpret_ok(parsed_intent: Value) -> Value {
    json!({"status": "ok", "parsed_intent": parsed_intent})
}

/// A `clarification_needed` interpretation payload.
pub fn interpret_clarification(missing_fields: &[&str]) -> Value {
    json!({"status": "clarification_needed", "missing_fields": missing_fields})
}

/// A `not_relevant` interpretation payload.
pub fn interpret_not_relevant(message: &str) -> Value {
    json!({"status": "not_relevant", "message": message})
}

/// An `error` interpretation payload.
pub fn interpret_error(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

/// An `ok` build payload carrying executable query text.
pub fn build_ok(query_text: &str) -> Value {
    json!({"status": "ok", "query_text": query_text})
}

/// A `needs_clarification` build payload.
pub fn build_needs_clarification(message: &str, questions: &[&str]) -> Value {
    json!({
        "status": "needs_clarification",
        "message": message,
        "clarification_questions": questions,
    })
}

/// An `invalid_fields` build payload.
pub fn build_invalid_fields(message: &str, fields: &[&str]) -> Value {
    json!({
        "status": "invalid_fields",
        "message": message,
        "invalid_fields": fields,
    })
}

/// An `error` build payload.
pub fn build_error(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

/// A payload that satisfies no stage contract.
pub fn garbage() -> Value {
    json!({"status": "transcendent", "vibes": true})
}

// ============================================================================
// ROW FIXTURES
// ============================================================================

/// Build one result row from column/value pairs.
pub fn row(pairs: &[(&str, Value)]) -> ResultRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A small click-count fixture.
pub fn click_rows() -> Vec<ResultRow> {
    vec![
        row(&[("app_id", json!("app-1")), ("clicks", json!(120))]),
        row(&[("app_id", json!("app-2")), ("clicks", json!(45))]),
    ]
}

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// Interpreter that replays scripted payloads, repeating the last one.
pub struct MockInterpreter {
    responses: Mutex<VecDeque<Value>>,
    last: Value,
    calls: AtomicUsize,
}

impl MockInterpreter {
    /// Always return the same payload.
    pub fn returning(payload: Value) -> Self {
        Self::scripted(vec![payload])
    }

    /// Return the payloads in order; the final one repeats.
    pub fn scripted(mut payloads: Vec<Value>) -> Self {
        let last = payloads.pop().unwrap_or(Value::Null);
        Self {
            responses: Mutex::new(payloads.into()),
            last,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interpreter for MockInterpreter {
    async fn interpret(&self, _message: &str) -> FathomResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.last.clone()))
    }
}

/// Query builder that always returns the same payload and counts calls.
pub struct MockQueryBuilder {
    payload: Value,
    calls: AtomicUsize,
}

impl MockQueryBuilder {
    pub fn returning(payload: Value) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryBuilder for MockQueryBuilder {
    async fn build(&self, _intent: &ParsedIntent) -> FathomResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

/// Summarizer that reports the row count; deterministic and call-counted.
pub struct EchoSummarizer {
    calls: AtomicUsize,
}

impl EchoSummarizer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for EchoSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(
        &self,
        question: &str,
        execution: &ExecutionResult,
    ) -> FathomResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} rows for: {question}", execution.row_count))
    }
}

/// Responder that passes the summary through; deterministic and
/// call-counted.
pub struct EchoResponder {
    calls: AtomicUsize,
}

impl EchoResponder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for EchoResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(
        &self,
        _question: &str,
        summary: &str,
        _execution: &ExecutionResult,
    ) -> FathomResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(summary.to_string())
    }
}

// ============================================================================
// MOCK EXECUTOR
// ============================================================================

/// Executor that returns fixed rows (or a fixed failure) and records every
/// query it is asked to run.
pub struct CountingExecutor {
    rows: Vec<ResultRow>,
    fail_message: Option<String>,
    queries: Mutex<Vec<String>>,
}

impl CountingExecutor {
    /// Succeed with the given rows on every call.
    pub fn returning(rows: Vec<ResultRow>) -> Self {
        Self {
            rows,
            fail_message: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call with a query error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            fail_message: Some(message.into()),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Number of executions attempted.
    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Every query text seen, in order.
    pub fn executed_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for CountingExecutor {
    async fn execute(&self, query_text: &str) -> FathomResult<Vec<ResultRow>> {
        self.queries.lock().unwrap().push(query_text.to_string());
        match &self.fail_message {
            Some(message) => Err(FathomError::Executor(ExecutorError::QueryFailed {
                message: message.clone(),
            })),
            None => Ok(self.rows.clone()),
        }
    }
}
