//! Year decomposition and recomposition.
//!
//! The read path turns one ranged descriptor into the list of cache entries
//! that would answer it. The write path partitions freshly computed rows back
//! into those entries, skipping any that were already served from cache.

use std::collections::{BTreeMap, BTreeSet};

use crate::{EncodingError, Fingerprint, KeyEncoder, LookupScope, QueryDescriptor, StatRow, Year};

/// One cache lookup of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    pub fingerprint: Fingerprint,
    pub scope: LookupScope,
}

impl LookupEntry {
    /// Years this entry covers once present in the cache.
    pub fn years(&self) -> Vec<Year> {
        self.scope.tagged_years()
    }
}

/// Every cache entry needed to answer a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPlan {
    entries: Vec<LookupEntry>,
    requested: BTreeSet<Year>,
}

impl LookupPlan {
    pub fn entries(&self) -> &[LookupEntry] {
        &self.entries
    }

    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.entries.iter().map(|e| e.fingerprint).collect()
    }

    /// Every year the descriptor asks for.
    pub fn requested_years(&self) -> &BTreeSet<Year> {
        &self.requested
    }

    /// Requested years not in `covered`, in ascending order.
    pub fn missing_years(&self, covered: &BTreeSet<Year>) -> Vec<Year> {
        self.requested.difference(covered).copied().collect()
    }

    pub fn is_fully_covered(&self, covered: &BTreeSet<Year>) -> bool {
        self.requested.is_subset(covered)
    }
}

/// One entry to write after computation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreItem {
    pub fingerprint: Fingerprint,
    pub scope: LookupScope,
    pub rows: Vec<StatRow>,
}

/// Result of partitioning computed rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorePlan {
    pub items: Vec<StoreItem>,
    /// Rows whose `year` was missing or outside the requested range.
    pub dropped_rows: usize,
}

/// Plans cache lookups and writes for descriptors.
#[derive(Debug, Clone, Copy, Default)]
pub struct YearPlanner {
    encoder: KeyEncoder,
}

impl YearPlanner {
    pub fn new(encoder: KeyEncoder) -> Self {
        Self { encoder }
    }

    pub fn encoder(&self) -> &KeyEncoder {
        &self.encoder
    }

    /// One entry per year for per-year splits, one entry for the whole range
    /// for career.
    pub fn plan_lookup(&self, descriptor: &QueryDescriptor) -> Result<LookupPlan, EncodingError> {
        let range = descriptor.years();
        let scopes: Vec<LookupScope> = if descriptor.split().is_career() {
            vec![LookupScope::Range(range)]
        } else {
            range.years().map(LookupScope::Year).collect()
        };

        let entries = scopes
            .into_iter()
            .map(|scope| {
                Ok(LookupEntry {
                    fingerprint: self.encoder.fingerprint(descriptor, scope)?,
                    scope,
                })
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;

        Ok(LookupPlan {
            entries,
            requested: range.years().collect(),
        })
    }

    /// Partition `computed` into per-entry writes, skipping covered years.
    ///
    /// Every missing year gets an item even when the engine produced no rows
    /// for it, so an empty season is cached rather than recomputed on each
    /// request. For career, `computed` is stored as a single entry unless
    /// the range is already covered.
    pub fn plan_store(
        &self,
        descriptor: &QueryDescriptor,
        computed: Vec<StatRow>,
        already_cached: &BTreeSet<Year>,
    ) -> Result<StorePlan, EncodingError> {
        let range = descriptor.years();

        if descriptor.split().is_career() {
            if range.years().all(|y| already_cached.contains(&y)) {
                return Ok(StorePlan::default());
            }
            let scope = LookupScope::Range(range);
            return Ok(StorePlan {
                items: vec![StoreItem {
                    fingerprint: self.encoder.fingerprint(descriptor, scope)?,
                    scope,
                    rows: computed,
                }],
                dropped_rows: 0,
            });
        }

        let mut by_year: BTreeMap<Year, Vec<StatRow>> = range
            .years()
            .filter(|y| !already_cached.contains(y))
            .map(|y| (y, Vec::new()))
            .collect();

        let mut dropped_rows = 0;
        for row in computed {
            match row.year().and_then(|y| by_year.get_mut(&y)) {
                Some(bucket) => bucket.push(row),
                None => {
                    // Out of range, untagged, or a year we already hold.
                    if row.year().map_or(true, |y| !range.contains(y)) {
                        dropped_rows += 1;
                    }
                }
            }
        }

        let items = by_year
            .into_iter()
            .map(|(year, rows)| {
                let scope = LookupScope::Year(year);
                Ok(StoreItem {
                    fingerprint: self.encoder.fingerprint(descriptor, scope)?,
                    scope,
                    rows,
                })
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;

        Ok(StorePlan {
            items,
            dropped_rows,
        })
    }
}

/// Concatenate cached and freshly computed rows. No ordering is implied.
pub fn recompose(mut cached: Vec<StatRow>, computed: Vec<StatRow>) -> Vec<StatRow> {
    cached.extend(computed);
    cached
}
