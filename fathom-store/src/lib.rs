//! FATHOM Store - Adaptive Query Cache
//!
//! Decides, per distinct query fingerprint, whether to execute against the
//! backing analytical store or reuse a previously computed snapshot. The
//! policy is three-tiered: the first two accesses to a fingerprint are
//! warm-up (always execute, never snapshot), the third seeds the snapshot,
//! and later accesses are served from cache while the snapshot is within
//! its TTL.
//!
//! Persistence hides behind the narrow [`CacheStore`] interface, which
//! exposes exactly the three atomic primitives the policy needs:
//! conditional insert, atomic counter increment, and last-writer-wins
//! snapshot write. In-memory and LMDB-backed stores are provided.

pub mod entry;
pub mod executor;
pub mod fingerprint;
pub mod lmdb;
pub mod query_cache;
pub mod store;

pub use entry::{CacheEntry, CachedResult};
pub use executor::{HttpQueryExecutor, QueryExecutor};
pub use fingerprint::{QueryFingerprint, DEFAULT_SCOPE};
pub use lmdb::{LmdbCacheStore, LmdbStoreError};
pub use query_cache::{CacheConfig, CacheStats, QueryCache};
pub use store::{CacheStore, MemoryCacheStore};
