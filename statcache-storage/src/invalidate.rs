//! Year-based invalidation.
//!
//! Run after a season's source data changes. Every cache entry that covers
//! the season is dropped, including career entries that span it.

use std::sync::Arc;

use statcache_core::{StatCacheResult, Year};
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Drops cache entries by year.
pub struct Invalidator<S: CacheStore> {
    store: Arc<S>,
}

impl<S: CacheStore> Invalidator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Remove every entry tagged with `year`.
    ///
    /// Returns the number of entries removed. A year with no entries is a
    /// no-op.
    pub fn invalidate_year(&self, year: Year) -> StatCacheResult<u64> {
        let removed = self.store.delete_by_year(year)?;
        if removed == 0 {
            debug!(year = %year, "No cache entries to invalidate");
        } else {
            info!(year = %year, removed, "Invalidated cache entries");
        }
        Ok(removed)
    }

    /// Invalidate several years, one transaction each.
    ///
    /// Stops at the first failing year; years already swept stay swept.
    pub fn invalidate_years<I>(&self, years: I) -> StatCacheResult<u64>
    where
        I: IntoIterator<Item = Year>,
    {
        let mut total = 0;
        for year in years {
            total += self.invalidate_year(year)?;
        }
        Ok(total)
    }
}

impl<S: CacheStore> Clone for Invalidator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}
