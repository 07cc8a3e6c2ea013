//! statcache Storage - Cache Stores, Invalidation and Query Resolution
//!
//! Persists computed statistic row-sets in LMDB, tagged by the seasons they
//! cover, and resolves descriptors against the cache with a statistics
//! engine behind it.

pub mod async_resolver;
pub mod cache;
pub mod invalidate;
pub mod resolver;

pub use async_resolver::AsyncQueryResolver;
pub use cache::{
    CacheStats, CacheStore, CachedEntry, InMemoryCacheStore, LmdbCacheStore, LmdbStoreError,
    YearTagKey, YEAR_TAG_KEY_LEN,
};
pub use invalidate::Invalidator;
pub use resolver::{QueryResolver, Resolution};
