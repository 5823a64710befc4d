//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) for a memory-mapped,
//! transactional key-value store. LMDB write transactions are serialized,
//! which gives the three [`CacheStore`] primitives their required
//! atomicity: create-if-absent and increment each run read-modify-write
//! inside a single write transaction.

use std::path::Path;

use async_trait::async_trait;
use fathom_core::{CacheError, FathomError, FathomResult, Timestamp};
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};

use crate::entry::CacheEntry;
use crate::store::CacheStore;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Entry encoding/decoding error.
    #[error("Codec error: {0}")]
    Codec(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for FathomError {
    fn from(e: LmdbStoreError) -> Self {
        FathomError::Cache(CacheError::StoreUnavailable {
            reason: e.to_string(),
        })
    }
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// let store = LmdbCacheStore::new("/var/lib/fathom/cache", 100)?;
/// let cache = QueryCache::with_defaults(store);
/// ```
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbCacheStore {
    /// Open (or create) an LMDB store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files are stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn encode(entry: &CacheEntry) -> Result<Vec<u8>, LmdbStoreError> {
        serde_json::to_vec(entry).map_err(|e| LmdbStoreError::Codec(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<CacheEntry, LmdbStoreError> {
        serde_json::from_slice(bytes).map_err(|e| LmdbStoreError::Codec(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn create_if_absent(&self, fingerprint: &str, query_text: &str) -> FathomResult<bool> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let exists = self
            .db
            .get(&wtxn, fingerprint)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let entry = CacheEntry::new(fingerprint, query_text);
        let bytes = Self::encode(&entry)?;
        self.db
            .put(&mut wtxn, fingerprint, &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(true)
    }

    async fn load(&self, fingerprint: &str) -> FathomResult<Option<CacheEntry>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let bytes = self
            .db
            .get(&rtxn, fingerprint)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        match bytes {
            Some(bytes) => Ok(Some(Self::decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn increment_use_count(&self, fingerprint: &str) -> FathomResult<i64> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let bytes = self
            .db
            .get(&wtxn, fingerprint)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
            .ok_or_else(|| {
                FathomError::Cache(CacheError::EntryMissing {
                    fingerprint: fingerprint.to_string(),
                })
            })?;

        let mut entry = Self::decode(bytes)?;
        entry.use_count += 1;
        let new_count = entry.use_count;

        let bytes = Self::encode(&entry)?;
        self.db
            .put(&mut wtxn, fingerprint, &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(new_count)
    }

    async fn store_result(
        &self,
        fingerprint: &str,
        query_text: &str,
        serialized_result: &str,
        last_updated: Timestamp,
        use_count: i64,
    ) -> FathomResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut entry = match self
            .db
            .get(&wtxn, fingerprint)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?
        {
            Some(bytes) => Self::decode(bytes)?,
            None => CacheEntry::new(fingerprint, query_text),
        };
        entry.query_text = query_text.to_string();
        entry.serialized_result = Some(serialized_result.to_string());
        entry.last_updated = Some(last_updated);
        entry.use_count = entry.use_count.max(use_count);

        let bytes = Self::encode(&entry)?;
        self.db
            .put(&mut wtxn, fingerprint, &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }
}
