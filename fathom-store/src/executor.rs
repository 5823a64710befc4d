//! Backing store execution seam.
//!
//! The cache never talks to the analytical store directly; it drives an
//! executor supplied by the caller. The HTTP executor here covers stores
//! that expose a JSON query endpoint; anything else implements the trait.

use async_trait::async_trait;
use fathom_core::{ExecutorError, FathomError, FathomResult, ResultRow};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Executes query text against the backing analytical store.
///
/// Failures propagate as errors; there is no retry at this layer. Timeouts
/// are the implementation's concern and surface as ordinary errors.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one query and return its rows in store order.
    async fn execute(&self, query_text: &str) -> FathomResult<Vec<ResultRow>>;
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    rows: Vec<ResultRow>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Executor for analytical stores that accept `POST {base_url}/query` with a
/// JSON body `{"query": "..."}` and answer `{"rows": [...]}`.
pub struct HttpQueryExecutor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQueryExecutor {
    /// Create a new executor against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Attach a bearer token sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    async fn execute(&self, query_text: &str) -> FathomResult<Vec<ResultRow>> {
        let url = format!("{}/query", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&QueryRequest { query: query_text });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            FathomError::Executor(ExecutorError::RequestFailed {
                status: 0,
                message: format!("HTTP request failed: {e}"),
            })
        })?;

        let status = response.status();
        if status.is_success() {
            let body: QueryResponse = response.json().await.map_err(|e| {
                FathomError::Executor(ExecutorError::InvalidResponse {
                    reason: format!("Failed to parse response: {e}"),
                })
            })?;
            return Ok(body.rows);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorResponse>(&error_text)
            .map(|e| e.message)
            .unwrap_or(error_text);

        Err(FathomError::Executor(match status {
            StatusCode::BAD_REQUEST => ExecutorError::QueryFailed { message },
            _ => ExecutorError::RequestFailed {
                status: status.as_u16() as i32,
                message,
            },
        }))
    }
}

impl std::fmt::Debug for HttpQueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQueryExecutor")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
