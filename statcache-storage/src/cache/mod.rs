//! Cache stores.
//!
//! A store persists row-sets under fingerprints and keeps, for each entry,
//! the set of years it covers. The year tags exist so that a change to one
//! season's source data can drop every entry computed from it.
//!
//! Two implementations are provided:
//! - [`LmdbCacheStore`]: durable, memory-mapped, shared across processes
//! - [`InMemoryCacheStore`]: process-local, same semantics

pub mod lmdb_backend;
pub mod memory;
pub mod traits;
pub mod year_key;

pub use lmdb_backend::{LmdbCacheStore, LmdbStoreError};
pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, CacheStore, CachedEntry};
pub use year_key::{YearTagKey, YEAR_TAG_KEY_LEN};
