//! In-memory cache store.
//!
//! Same semantics as [`LmdbCacheStore`](super::LmdbCacheStore) without
//! persistence. Row-sets are held encoded so that serialization failures
//! surface exactly as they would on disk. Used by tests and by callers that
//! want a process-local cache.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use statcache_core::{Fingerprint, StatCacheResult, StatRow, StoreError, Year};

use super::traits::{decode_rows, encode_rows, CacheStats, CacheStore, CachedEntry};

#[derive(Debug, Default)]
struct MemoryTables {
    calls: HashMap<Fingerprint, Vec<u8>>,
    years: BTreeMap<Fingerprint, BTreeSet<Year>>,
}

impl MemoryTables {
    fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CachedEntry>, StoreError> {
        let Some(bytes) = self.calls.get(fingerprint) else {
            return Ok(None);
        };
        let years: Vec<Year> = self
            .years
            .get(fingerprint)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if years.is_empty() {
            return Err(StoreError::MissingYearTags {
                fingerprint: fingerprint.to_hex(),
            });
        }
        Ok(Some(CachedEntry {
            rows: decode_rows(fingerprint, bytes)?,
            years,
        }))
    }
}

/// Process-local cache store guarded by a single lock.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    tables: RwLock<MemoryTables>,
    hits: AtomicU64,
    misses: AtomicU64,
    bytes_written: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_lookup(&self, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, fingerprint: &Fingerprint) -> StatCacheResult<Option<Vec<StatRow>>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let rows = match tables.calls.get(fingerprint) {
            Some(bytes) => Some(decode_rows(fingerprint, bytes)?),
            None => None,
        };
        self.record_lookup(rows.is_some());
        Ok(rows)
    }

    fn get_years(&self, fingerprint: &Fingerprint) -> StatCacheResult<Vec<Year>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(tables
            .years
            .get(fingerprint)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn get_many(
        &self,
        fingerprints: &[Fingerprint],
    ) -> StatCacheResult<Vec<Option<CachedEntry>>> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut entries = Vec::with_capacity(fingerprints.len());
        for fingerprint in fingerprints {
            let entry = tables.entry(fingerprint)?;
            self.record_lookup(entry.is_some());
            entries.push(entry);
        }
        Ok(entries)
    }

    fn put(
        &self,
        fingerprint: &Fingerprint,
        rows: &[StatRow],
        years: &[Year],
    ) -> StatCacheResult<()> {
        let payload = encode_rows(fingerprint, rows, years)?;
        let written = payload.len() as u64;

        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        tables.calls.insert(*fingerprint, payload);
        tables
            .years
            .insert(*fingerprint, years.iter().copied().collect());
        drop(tables);

        self.bytes_written.fetch_add(written, Ordering::Relaxed);
        Ok(())
    }

    fn delete_by_year(&self, year: Year) -> StatCacheResult<u64> {
        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let targets: Vec<Fingerprint> = tables
            .years
            .iter()
            .filter(|(_, tags)| tags.contains(&year))
            .map(|(fp, _)| *fp)
            .collect();

        let mut deleted = 0u64;
        for fingerprint in &targets {
            tables.years.remove(fingerprint);
            if tables.calls.remove(fingerprint).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn stats(&self) -> StatCacheResult<CacheStats> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: tables.calls.len() as u64,
            year_tag_count: tables.years.values().map(|s| s.len() as u64).sum(),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statcache_core::{StatCacheError, FINGERPRINT_LEN};

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    fn row(year: i64) -> StatRow {
        StatRow::new().with("year", year).with("player_id", "bettsmo01")
    }

    #[test]
    fn test_put_get_and_tags() {
        let store = InMemoryCacheStore::new();
        store
            .put(&fp(1), &[row(2020)], &[Year::new(2020)])
            .unwrap();
        assert_eq!(store.get(&fp(1)).unwrap(), Some(vec![row(2020)]));
        assert_eq!(store.get_year(&fp(1)).unwrap(), Some(Year::new(2020)));
    }

    #[test]
    fn test_put_replaces_tag_set() {
        let store = InMemoryCacheStore::new();
        store
            .put(&fp(1), &[], &[Year::new(2019), Year::new(2020)])
            .unwrap();
        store.put(&fp(1), &[], &[Year::new(2021)]).unwrap();
        assert_eq!(store.get_years(&fp(1)).unwrap(), vec![Year::new(2021)]);
    }

    #[test]
    fn test_delete_by_year_counts_entries() {
        let store = InMemoryCacheStore::new();
        store
            .put(&fp(1), &[], &[Year::new(2019), Year::new(2020)])
            .unwrap();
        store.put(&fp(2), &[row(2020)], &[Year::new(2020)]).unwrap();
        store.put(&fp(3), &[row(2018)], &[Year::new(2018)]).unwrap();

        assert_eq!(store.delete_by_year(Year::new(2020)).unwrap(), 2);
        assert_eq!(store.get(&fp(1)).unwrap(), None);
        assert_eq!(store.get(&fp(2)).unwrap(), None);
        assert!(store.get(&fp(3)).unwrap().is_some());
        assert_eq!(store.stats().unwrap().entry_count, 1);
    }

    #[test]
    fn test_unserializable_rejected() {
        let store = InMemoryCacheStore::new();
        let bad = StatRow::new().with("year", 2020i64).with("OPS", f64::NAN);
        let err = store.put(&fp(1), &[bad], &[Year::new(2020)]).unwrap_err();
        assert!(matches!(
            err,
            StatCacheError::Store(StoreError::Unserializable { .. })
        ));
        assert_eq!(store.stats().unwrap().entry_count, 0);
    }

    #[test]
    fn test_get_many_counts_hits_and_misses() {
        let store = InMemoryCacheStore::new();
        store.put(&fp(1), &[], &[Year::new(2020)]).unwrap();
        let entries = store.get_many(&[fp(1), fp(2)]).unwrap();
        assert!(entries[0].is_some());
        assert!(entries[1].is_none());

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
