//! The narrow cache storage interface and its in-memory implementation.
//!
//! The cache policy never reads-then-writes through this interface: every
//! mutation is one of three atomic primitives, so that N concurrent
//! first-time accesses to the same fingerprint yield exactly one entry with
//! a correctly accumulated use count. No in-process locks exist above this
//! layer; correctness is delegated entirely to the store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fathom_core::{CacheError, FathomError, FathomResult};

use crate::entry::CacheEntry;

/// Pluggable persistence for cache entries.
///
/// Entries are never deleted through this interface; the store grows
/// unbounded by design and capacity is an operational concern.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Conditionally insert a fresh entry (`use_count=1`, no snapshot).
    ///
    /// Returns `true` if this call created the entry, `false` if another
    /// writer got there first. Must be atomic: concurrent calls for the
    /// same fingerprint create exactly one entry.
    async fn create_if_absent(&self, fingerprint: &str, query_text: &str) -> FathomResult<bool>;

    /// Load the entry for a fingerprint, if any.
    async fn load(&self, fingerprint: &str) -> FathomResult<Option<CacheEntry>>;

    /// Atomically increment the use count and return the new value.
    ///
    /// Never touches `serialized_result` or `last_updated`; the TTL clock
    /// runs on computation time, not access time.
    async fn increment_use_count(&self, fingerprint: &str) -> FathomResult<i64>;

    /// Write a snapshot (last-writer-wins for the snapshot itself),
    /// together with the query text, computation timestamp, and use count.
    ///
    /// The stored use count never decreases: a snapshot write carrying a
    /// count older than concurrent increments must keep the larger value.
    async fn store_result(
        &self,
        fingerprint: &str,
        query_text: &str,
        serialized_result: &str,
        last_updated: fathom_core::Timestamp,
        use_count: i64,
    ) -> FathomResult<()>;
}

/// In-memory cache store.
///
/// Each primitive runs under a single mutex guard, which gives it the same
/// atomicity the interface demands from persistent stores.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn create_if_absent(&self, fingerprint: &str, query_text: &str) -> FathomResult<bool> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| FathomError::Cache(CacheError::LockPoisoned))?;
        if entries.contains_key(fingerprint) {
            return Ok(false);
        }
        entries.insert(
            fingerprint.to_string(),
            CacheEntry::new(fingerprint, query_text),
        );
        Ok(true)
    }

    async fn load(&self, fingerprint: &str) -> FathomResult<Option<CacheEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| FathomError::Cache(CacheError::LockPoisoned))?;
        Ok(entries.get(fingerprint).cloned())
    }

    async fn increment_use_count(&self, fingerprint: &str) -> FathomResult<i64> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| FathomError::Cache(CacheError::LockPoisoned))?;
        let entry = entries.get_mut(fingerprint).ok_or_else(|| {
            FathomError::Cache(CacheError::EntryMissing {
                fingerprint: fingerprint.to_string(),
            })
        })?;
        entry.use_count += 1;
        Ok(entry.use_count)
    }

    async fn store_result(
        &self,
        fingerprint: &str,
        query_text: &str,
        serialized_result: &str,
        last_updated: fathom_core::Timestamp,
        use_count: i64,
    ) -> FathomResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| FathomError::Cache(CacheError::LockPoisoned))?;
        let entry = entries
            .entry(fingerprint.to_string())
            .or_insert_with(|| CacheEntry::new(fingerprint, query_text));
        entry.query_text = query_text.to_string();
        entry.serialized_result = Some(serialized_result.to_string());
        entry.last_updated = Some(last_updated);
        entry.use_count = entry.use_count.max(use_count);
        Ok(())
    }
}
