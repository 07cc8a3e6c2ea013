//! Read-through query resolution.
//!
//! Serves each requested season from the cache when possible, asks the
//! statistics engine for the rest in one call, then stores what it computed.
//!
//! # Failure semantics
//!
//! If the engine fails, nothing is written and the error is returned; years
//! already cached stay cached. Store failures propagate unchanged.

use std::collections::BTreeSet;
use std::sync::Arc;

use statcache_core::{
    recompose, sanitize_rows, EngineScope, KeyEncoder, QueryDescriptor, StatCacheResult, StatRow,
    StatsEngine, Year, YearPlanner,
};
use tracing::{debug, warn};

use crate::cache::CacheStore;

/// Outcome of [`QueryResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Cached rows followed by freshly computed rows. No ordering is implied.
    pub rows: Vec<StatRow>,
    /// Years served from the cache.
    pub covered_years: BTreeSet<Year>,
    /// Years computed by the engine during this call.
    pub computed_years: BTreeSet<Year>,
}

impl Resolution {
    /// True when the engine was not consulted.
    pub fn is_full_hit(&self) -> bool {
        self.computed_years.is_empty()
    }
}

/// Resolves descriptors against a cache store and a statistics engine.
///
/// # Type Parameters
///
/// - `S`: The cache store
/// - `E`: The statistics engine consulted on a miss
pub struct QueryResolver<S, E>
where
    S: CacheStore,
    E: StatsEngine,
{
    store: Arc<S>,
    engine: Arc<E>,
    planner: YearPlanner,
}

impl<S, E> QueryResolver<S, E>
where
    S: CacheStore,
    E: StatsEngine,
{
    pub fn new(store: Arc<S>, engine: Arc<E>, encoder: KeyEncoder) -> Self {
        Self {
            store,
            engine,
            planner: YearPlanner::new(encoder),
        }
    }

    /// Create a resolver with the default cache version.
    pub fn with_defaults(store: Arc<S>, engine: Arc<E>) -> Self {
        Self::new(store, engine, KeyEncoder::default())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shared handle to the store, for an [`Invalidator`](crate::Invalidator)
    /// over the same cache.
    pub fn shared_store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn planner(&self) -> &YearPlanner {
        &self.planner
    }

    /// Resolve `descriptor`, computing and caching any missing seasons.
    pub fn resolve(&self, descriptor: &QueryDescriptor) -> StatCacheResult<Resolution> {
        let plan = self.planner.plan_lookup(descriptor)?;
        let entries = self.store.get_many(&plan.fingerprints())?;

        let mut cached_rows = Vec::new();
        let mut covered_years = BTreeSet::new();
        for entry in entries.into_iter().flatten() {
            covered_years.extend(
                entry
                    .years
                    .iter()
                    .copied()
                    .filter(|y| plan.requested_years().contains(y)),
            );
            cached_rows.extend(entry.rows);
        }

        let missing = plan.missing_years(&covered_years);
        debug!(
            descriptor = %descriptor,
            hits = covered_years.len(),
            misses = missing.len(),
            "Cache lookup"
        );

        if missing.is_empty() {
            return Ok(Resolution {
                rows: cached_rows,
                covered_years,
                computed_years: BTreeSet::new(),
            });
        }

        let scope = if descriptor.split().is_career() {
            EngineScope::Range(descriptor.years())
        } else {
            EngineScope::Years(missing.clone())
        };

        let mut computed = self.engine.compute(descriptor, &scope).map_err(|e| {
            warn!(descriptor = %descriptor, scope = %scope, error = %e, "Statistics engine failed");
            e
        })?;
        sanitize_rows(&mut computed);

        let store_plan = self
            .planner
            .plan_store(descriptor, computed, &covered_years)?;
        if store_plan.dropped_rows > 0 {
            warn!(
                descriptor = %descriptor,
                dropped = store_plan.dropped_rows,
                "Engine returned rows outside the requested years"
            );
        }

        let mut computed_rows = Vec::new();
        for item in store_plan.items {
            let years = item.scope.tagged_years();
            self.store.put(&item.fingerprint, &item.rows, &years)?;
            computed_rows.extend(item.rows);
        }

        Ok(Resolution {
            rows: recompose(cached_rows, computed_rows),
            covered_years,
            computed_years: missing.into_iter().collect(),
        })
    }
}

impl<S, E> Clone for QueryResolver<S, E>
where
    S: CacheStore,
    E: StatsEngine,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: Arc::clone(&self.engine),
            planner: self.planner,
        }
    }
}
