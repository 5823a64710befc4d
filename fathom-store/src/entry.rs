//! Persistent cache entry and its transient snapshot view.

use std::time::Duration;

use fathom_core::{ResultRow, Timestamp};
use serde::{Deserialize, Serialize};

/// One persisted cache record, keyed by fingerprint.
///
/// Invariants:
/// - `use_count` is monotonically non-decreasing
/// - `serialized_result` stays `None` until `use_count` first reaches the
///   warm-up threshold
/// - `last_updated` is set only when `serialized_result` is written and
///   reflects computation time, not access time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The fingerprint key.
    pub fingerprint: String,
    /// The query text this fingerprint resolves to.
    pub query_text: String,
    /// JSON-encoded rows, absent during warm-up.
    pub serialized_result: Option<String>,
    /// When the snapshot was computed.
    pub last_updated: Option<Timestamp>,
    /// Total accesses to this fingerprint, hit or miss.
    pub use_count: i64,
}

impl CacheEntry {
    /// A freshly created entry: first access, no snapshot yet.
    pub fn new(fingerprint: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            query_text: query_text.into(),
            serialized_result: None,
            last_updated: None,
            use_count: 1,
        }
    }

    /// Decode the stored snapshot.
    ///
    /// A corrupt snapshot decodes to `None`, exactly like a missing one; it
    /// is never surfaced as an error.
    pub fn decode_snapshot(&self) -> Option<Vec<ResultRow>> {
        let raw = self.serialized_result.as_deref()?;
        serde_json::from_str(raw).ok()
    }

    /// Whether the snapshot exists and is within its TTL at `now`.
    pub fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        match (&self.serialized_result, &self.last_updated) {
            (Some(_), Some(updated)) => {
                let ttl = chrono::Duration::from_std(ttl)
                    .unwrap_or_else(|_| chrono::Duration::max_value());
                now.signed_duration_since(*updated) <= ttl
            }
            _ => false,
        }
    }
}

/// Transient view of a valid snapshot, handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    /// Rows in the order they were computed.
    pub rows: Vec<ResultRow>,
    /// The query text that produced the snapshot.
    pub executed_query: String,
    /// Number of rows in the snapshot.
    pub row_count: usize,
}

impl CachedResult {
    /// Build the view from a decoded snapshot.
    pub fn from_entry(entry: &CacheEntry, rows: Vec<ResultRow>) -> Self {
        let row_count = rows.len();
        Self {
            rows,
            executed_query: entry.query_text.clone(),
            row_count,
        }
    }
}
