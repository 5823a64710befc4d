//! The adaptive query cache.
//!
//! Three-tier usage policy plus TTL, per fingerprint:
//!
//! - accesses 1-2 (warm-up): always execute, never snapshot
//! - access 3: execute and seed the snapshot
//! - access 4+: serve the snapshot while fresh, otherwise refresh
//!
//! The use count reflects total accesses regardless of hit or miss. The
//! count is incremented before branching, so an access that loses a
//! creation race still gets counted through the increment path.

use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use fathom_core::{CacheError, FathomError, FathomResult, ResultRow};

use crate::entry::{CacheEntry, CachedResult};
use crate::executor::QueryExecutor;
use crate::fingerprint::QueryFingerprint;
use crate::store::CacheStore;

/// Cache policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a snapshot stays servable after computation.
    pub ttl: Duration,
    /// The access on which the snapshot is first seeded. Accesses below
    /// this are warm-up.
    pub warmup_threshold: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            warmup_threshold: 3,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the warm-up threshold.
    pub fn with_warmup_threshold(mut self, threshold: i64) -> Self {
        self.warmup_threshold = threshold.max(1);
        self
    }
}

/// Counters for cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Snapshot served without execution.
    pub hits: u64,
    /// Execution performed (cold, warm-up, or seed).
    pub misses: u64,
    /// Miss that overwrote a stale or corrupt snapshot.
    pub refreshes: u64,
    /// Entries created by this cache instance.
    pub entries_created: u64,
}

impl CacheStats {
    /// Hit rate over all accesses (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.refreshes;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Fingerprint-addressed execute-vs-reuse decision logic.
pub struct QueryCache<S: CacheStore> {
    store: S,
    config: CacheConfig,
    stats: RwLock<CacheStats>,
}

impl<S: CacheStore> QueryCache<S> {
    /// Create a cache over a store with the given policy.
    pub fn new(store: S, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Create a cache with the default policy (TTL 30s, threshold 3).
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, CacheConfig::default())
    }

    /// The active policy.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the behavior counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| *s).unwrap_or_default()
    }

    /// Run a query through the cache policy.
    ///
    /// Returns the rows plus whether they came from a cached snapshot.
    /// Executor failures and store failures both propagate; a store failure
    /// is never downgraded to "just execute", since that would mask a
    /// storage outage while silently dropping usage accounting.
    pub async fn run_with_cache(
        &self,
        query_text: &str,
        fingerprint: &QueryFingerprint,
        executor: &dyn QueryExecutor,
    ) -> FathomResult<(Vec<ResultRow>, bool)> {
        let key = fingerprint.as_str();

        if self.store.load(key).await?.is_none() {
            if self.store.create_if_absent(key, query_text).await? {
                tracing::info!(fingerprint = %preview(key), "cache entry created, use_count=1");
                self.record(|s| s.entries_created += 1);
                return self.execute_miss(query_text, executor).await;
            }
            // Lost the creation race; the entry exists now, so this access
            // is counted through the increment path like any other.
        }

        let use_count = self.store.increment_use_count(key).await?;

        if use_count < self.config.warmup_threshold {
            tracing::debug!(
                fingerprint = %preview(key),
                use_count,
                "warm-up access, executing without snapshot"
            );
            return self.execute_miss(query_text, executor).await;
        }

        if use_count == self.config.warmup_threshold {
            tracing::info!(
                fingerprint = %preview(key),
                use_count,
                "warm-up complete, seeding snapshot"
            );
            let rows = executor.execute(query_text).await?;
            self.persist_snapshot(key, query_text, &rows, use_count).await?;
            self.record(|s| s.misses += 1);
            return Ok((rows, false));
        }

        // Past the threshold: serve the snapshot while fresh.
        if let Some(entry) = self.store.load(key).await? {
            if entry.is_fresh(Utc::now(), self.config.ttl) {
                if let Some(rows) = entry.decode_snapshot() {
                    tracing::info!(fingerprint = %preview(key), use_count, "cache hit");
                    self.record(|s| s.hits += 1);
                    return Ok((rows, true));
                }
                tracing::warn!(
                    fingerprint = %preview(key),
                    "stored snapshot is corrupt, refreshing"
                );
            }
        }

        tracing::info!(
            fingerprint = %preview(key),
            use_count,
            "snapshot missing or stale, refreshing"
        );
        let rows = executor.execute(query_text).await?;
        self.persist_snapshot(key, query_text, &rows, use_count).await?;
        self.record(|s| s.refreshes += 1);
        Ok((rows, false))
    }

    /// Return the valid cached view for a fingerprint, if one exists.
    ///
    /// `None` when there is no entry, no snapshot, the snapshot is
    /// unreadable, or the TTL has expired. Does not count as an access.
    pub async fn get_valid(
        &self,
        fingerprint: &QueryFingerprint,
    ) -> FathomResult<Option<CachedResult>> {
        let Some(entry) = self.store.load(fingerprint.as_str()).await? else {
            return Ok(None);
        };
        if !entry.is_fresh(Utc::now(), self.config.ttl) {
            return Ok(None);
        }
        let Some(rows) = entry.decode_snapshot() else {
            return Ok(None);
        };
        Ok(Some(CachedResult::from_entry(&entry, rows)))
    }

    /// Load the raw entry for a fingerprint, valid or not.
    pub async fn get_entry(
        &self,
        fingerprint: &QueryFingerprint,
    ) -> FathomResult<Option<CacheEntry>> {
        self.store.load(fingerprint.as_str()).await
    }

    async fn execute_miss(
        &self,
        query_text: &str,
        executor: &dyn QueryExecutor,
    ) -> FathomResult<(Vec<ResultRow>, bool)> {
        let rows = executor.execute(query_text).await?;
        self.record(|s| s.misses += 1);
        Ok((rows, false))
    }

    async fn persist_snapshot(
        &self,
        key: &str,
        query_text: &str,
        rows: &[ResultRow],
        use_count: i64,
    ) -> FathomResult<()> {
        let serialized = serde_json::to_string(rows).map_err(|e| {
            FathomError::Cache(CacheError::Serialization {
                reason: e.to_string(),
            })
        })?;
        self.store
            .store_result(key, query_text, &serialized, Utc::now(), use_count)
            .await
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

/// Shorten a fingerprint for log lines.
fn preview(key: &str) -> String {
    key.chars().take(48).collect()
}
