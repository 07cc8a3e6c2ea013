//! Async facade over the blocking resolver.
//!
//! LMDB transactions and engine scans block the calling thread. Async
//! request handlers go through [`AsyncQueryResolver`], which runs each call
//! on tokio's blocking pool.

use statcache_core::{ComputationError, QueryDescriptor, StatCacheResult, StatsEngine, Year};
use tokio::task::JoinError;

use crate::cache::{CacheStats, CacheStore};
use crate::invalidate::Invalidator;
use crate::resolver::{QueryResolver, Resolution};

fn join_err(e: JoinError) -> ComputationError {
    ComputationError::TaskFailed {
        reason: e.to_string(),
    }
}

/// Runs resolution and invalidation off the async executor.
///
/// Cloning is cheap; clones share the store and engine.
pub struct AsyncQueryResolver<S, E>
where
    S: CacheStore + 'static,
    E: StatsEngine + 'static,
{
    resolver: QueryResolver<S, E>,
    invalidator: Invalidator<S>,
}

impl<S, E> AsyncQueryResolver<S, E>
where
    S: CacheStore + 'static,
    E: StatsEngine + 'static,
{
    pub fn new(resolver: QueryResolver<S, E>) -> Self {
        let invalidator = Invalidator::new(resolver.shared_store());
        Self {
            resolver,
            invalidator,
        }
    }

    pub fn resolver(&self) -> &QueryResolver<S, E> {
        &self.resolver
    }

    pub async fn resolve(&self, descriptor: QueryDescriptor) -> StatCacheResult<Resolution> {
        let resolver = self.resolver.clone();
        tokio::task::spawn_blocking(move || resolver.resolve(&descriptor))
            .await
            .map_err(join_err)?
    }

    pub async fn invalidate_year(&self, year: Year) -> StatCacheResult<u64> {
        let invalidator = self.invalidator.clone();
        tokio::task::spawn_blocking(move || invalidator.invalidate_year(year))
            .await
            .map_err(join_err)?
    }

    pub async fn stats(&self) -> StatCacheResult<CacheStats> {
        let store = self.resolver.shared_store();
        tokio::task::spawn_blocking(move || store.stats())
            .await
            .map_err(join_err)?
    }
}

impl<S, E> Clone for AsyncQueryResolver<S, E>
where
    S: CacheStore + 'static,
    E: StatsEngine + 'static,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            invalidator: self.invalidator.clone(),
        }
    }
}
