//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cached row-sets in a
//! memory-mapped, crash-safe key-value store that survives process restarts.
//!
//! # Layout
//!
//! Two named databases share one environment:
//! - `calls`: fingerprint (32 bytes) -> JSON-encoded row-set
//! - `years`: [`YearTagKey`] (fingerprint ‖ big-endian year) -> unit
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`, `get_years` and `get_many`
//! - One write transaction per `put` and per `delete_by_year`, covering both
//!   databases, so a row-set is never visible without its year tags
//! - Hit and miss counters are atomics

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use heed::types::{Bytes, Unit};
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use statcache_core::{
    CacheSettings, Fingerprint, StatCacheError, StatCacheResult, StatRow, StoreError, Year,
};
use tracing::{debug, info, warn};

use super::traits::{decode_rows, encode_rows, CacheStats, CacheStore, CachedEntry};
use super::year_key::{YearTagKey, YEAR_TAG_KEY_LEN};

const CALLS_DB: &str = "calls";
const YEARS_DB: &str = "years";

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment at {path}: {reason}")]
    EnvOpen { path: PathBuf, reason: String },

    /// Failed to open a database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: &'static str, reason: String },

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every LMDB failure means the medium is unusable for this operation.
impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        StoreError::Unavailable {
            reason: e.to_string(),
        }
    }
}

impl From<LmdbStoreError> for StatCacheError {
    fn from(e: LmdbStoreError) -> Self {
        StatCacheError::Store(e.into())
    }
}

fn txn_err(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// LMDB-backed cache store.
///
/// # Example
///
/// ```ignore
/// use statcache_storage::{CacheStore, LmdbCacheStore};
///
/// let store = LmdbCacheStore::open("lmdb_db", 1024)?;
/// store.put(&fingerprint, &rows, &[Year::new(2021)])?;
/// assert_eq!(store.get_year(&fingerprint)?, Some(Year::new(2021)));
/// ```
pub struct LmdbCacheStore {
    env: Env,
    calls: Database<Bytes, Bytes>,
    years: Database<Bytes, Unit>,
    path: PathBuf,
    hits: AtomicU64,
    misses: AtomicU64,
    bytes_written: AtomicU64,
}

impl LmdbCacheStore {
    /// Open (creating if needed) the environment at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `map_size_mb` - Maximum size of the memory map in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    /// - Either database cannot be created
    pub fn open<P: AsRef<Path>>(path: P, map_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size_mb.saturating_mul(1024 * 1024))
                .max_dbs(2)
                .open(&path)
        }
        .map_err(|e| LmdbStoreError::EnvOpen {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let calls: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some(CALLS_DB))
            .map_err(|e| LmdbStoreError::DbOpen {
                name: CALLS_DB,
                reason: e.to_string(),
            })?;
        let years: Database<Bytes, Unit> = env
            .create_database(&mut wtxn, Some(YEARS_DB))
            .map_err(|e| LmdbStoreError::DbOpen {
                name: YEARS_DB,
                reason: e.to_string(),
            })?;
        wtxn.commit().map_err(txn_err)?;

        info!(path = %path.display(), map_size_mb, "Opened LMDB cache store");

        Ok(Self {
            env,
            calls,
            years,
            path,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
        })
    }

    /// Open using loaded settings.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, LmdbStoreError> {
        Self::open(&settings.path, settings.map_size_mb)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_lookup(&self, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Year tags of `fingerprint` inside an open transaction.
    fn years_in(
        &self,
        txn: &RoTxn,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<Year>, LmdbStoreError> {
        let prefix = YearTagKey::fingerprint_prefix(fingerprint);
        let iter = self.years.prefix_iter(txn, &prefix).map_err(txn_err)?;

        let mut years = Vec::new();
        for result in iter {
            let (key, ()) = result.map_err(txn_err)?;
            if let Some(tag) = YearTagKey::decode(key) {
                years.push(tag.year());
            }
        }
        Ok(years)
    }

    /// Raw year-tag keys of `fingerprint`, collected so they can be deleted.
    fn tag_keys_in(
        &self,
        txn: &RoTxn,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<Vec<u8>>, LmdbStoreError> {
        let prefix = YearTagKey::fingerprint_prefix(fingerprint);
        let iter = self.years.prefix_iter(txn, &prefix).map_err(txn_err)?;

        let mut keys = Vec::new();
        for result in iter {
            let (key, ()) = result.map_err(txn_err)?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    /// Read one entry inside an open transaction.
    fn entry_in(
        &self,
        txn: &RoTxn,
        fingerprint: &Fingerprint,
    ) -> StatCacheResult<Option<CachedEntry>> {
        let Some(bytes) = self.calls.get(txn, fingerprint.as_bytes()).map_err(txn_err)? else {
            return Ok(None);
        };
        let rows = decode_rows(fingerprint, bytes)?;
        let years = self.years_in(txn, fingerprint)?;
        if years.is_empty() {
            return Err(StoreError::MissingYearTags {
                fingerprint: fingerprint.to_hex(),
            }
            .into());
        }
        Ok(Some(CachedEntry { rows, years }))
    }
}

impl CacheStore for LmdbCacheStore {
    fn get(&self, fingerprint: &Fingerprint) -> StatCacheResult<Option<Vec<StatRow>>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;

        match self.calls.get(&rtxn, fingerprint.as_bytes()) {
            Ok(Some(bytes)) => {
                self.record_lookup(true);
                Ok(Some(decode_rows(fingerprint, bytes)?))
            }
            Ok(None) => {
                self.record_lookup(false);
                Ok(None)
            }
            Err(e) => Err(txn_err(e).into()),
        }
    }

    fn get_years(&self, fingerprint: &Fingerprint) -> StatCacheResult<Vec<Year>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        Ok(self.years_in(&rtxn, fingerprint)?)
    }

    fn get_many(
        &self,
        fingerprints: &[Fingerprint],
    ) -> StatCacheResult<Vec<Option<CachedEntry>>> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;

        let mut entries = Vec::with_capacity(fingerprints.len());
        for fingerprint in fingerprints {
            let entry = self.entry_in(&rtxn, fingerprint)?;
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

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        // Replace the tag set, not merge into it.
        for key in self.tag_keys_in(&wtxn, fingerprint)? {
            self.years.delete(&mut wtxn, &key).map_err(txn_err)?;
        }

        self.calls
            .put(&mut wtxn, fingerprint.as_bytes(), &payload)
            .map_err(txn_err)?;
        for year in years {
            let key = YearTagKey::new(*fingerprint, *year).encode();
            self.years.put(&mut wtxn, &key, &()).map_err(txn_err)?;
        }

        wtxn.commit().map_err(txn_err)?;

        self.bytes_written
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        debug!(
            fingerprint = %fingerprint,
            rows = rows.len(),
            years = years.len(),
            bytes = payload.len(),
            "Stored cache entry"
        );
        Ok(())
    }

    fn delete_by_year(&self, year: Year) -> StatCacheResult<u64> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        // Full scan of the tag table; the year is the key suffix.
        let mut targets = Vec::new();
        {
            let iter = self.years.iter(&wtxn).map_err(txn_err)?;
            for result in iter {
                let (key, ()) = result.map_err(txn_err)?;
                match YearTagKey::decode(key) {
                    Some(tag) if tag.year() == year => targets.push(tag.fingerprint()),
                    Some(_) => {}
                    None => warn!(
                        len = key.len(),
                        expected = YEAR_TAG_KEY_LEN,
                        "Skipping malformed year tag"
                    ),
                }
            }
        }

        let mut deleted = 0u64;
        for fingerprint in &targets {
            for key in self.tag_keys_in(&wtxn, fingerprint)? {
                self.years.delete(&mut wtxn, &key).map_err(txn_err)?;
            }
            if self
                .calls
                .delete(&mut wtxn, fingerprint.as_bytes())
                .map_err(txn_err)?
            {
                deleted += 1;
            }
        }

        wtxn.commit().map_err(txn_err)?;

        debug!(year = %year, deleted, "Deleted cache entries by year");
        Ok(deleted)
    }

    fn stats(&self) -> StatCacheResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let entry_count = self.calls.len(&rtxn).map_err(txn_err)?;
        let year_tag_count = self.years.len(&rtxn).map_err(txn_err)?;

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            year_tag_count,
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statcache_core::FINGERPRINT_LEN;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store =
            LmdbCacheStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    fn rows(year: i64) -> Vec<StatRow> {
        vec![
            StatRow::new().with("year", year).with("player_id", "troutmi01").with("HR", 40i64),
            StatRow::new().with("year", year).with("player_id", "judgeaa01").with("HR", 52i64),
        ]
    }

    #[test]
    fn test_put_then_get() {
        let (store, _dir) = create_test_store();
        store.put(&fp(1), &rows(2021), &[Year::new(2021)]).unwrap();

        assert_eq!(store.get(&fp(1)).unwrap(), Some(rows(2021)));
        assert_eq!(store.get_year(&fp(1)).unwrap(), Some(Year::new(2021)));
        assert_eq!(store.get_years(&fp(1)).unwrap(), vec![Year::new(2021)]);
    }

    #[test]
    fn test_get_absent() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get(&fp(9)).unwrap(), None);
        assert_eq!(store.get_year(&fp(9)).unwrap(), None);
        assert!(store.get_years(&fp(9)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_row_set_is_a_hit() {
        let (store, _dir) = create_test_store();
        store.put(&fp(1), &[], &[Year::new(2020)]).unwrap();
        assert_eq!(store.get(&fp(1)).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_put_replaces_rows_and_tags() {
        let (store, _dir) = create_test_store();
        let career = [Year::new(2019), Year::new(2020)];
        store.put(&fp(1), &rows(2019), &career).unwrap();
        store.put(&fp(1), &rows(2021), &[Year::new(2021)]).unwrap();

        assert_eq!(store.get(&fp(1)).unwrap(), Some(rows(2021)));
        assert_eq!(store.get_years(&fp(1)).unwrap(), vec![Year::new(2021)]);
        assert_eq!(store.delete_by_year(Year::new(2019)).unwrap(), 0);
    }

    #[test]
    fn test_put_without_years_rejected() {
        let (store, _dir) = create_test_store();
        let err = store.put(&fp(1), &rows(2021), &[]).unwrap_err();
        assert!(matches!(
            err,
            StatCacheError::Store(StoreError::MissingYearTags { .. })
        ));
        assert_eq!(store.get(&fp(1)).unwrap(), None);
    }

    #[test]
    fn test_put_non_finite_rejected_without_partial_write() {
        let (store, _dir) = create_test_store();
        let bad = vec![StatRow::new().with("year", 2021i64).with("ERA", f64::INFINITY)];
        let err = store.put(&fp(1), &bad, &[Year::new(2021)]).unwrap_err();
        assert!(matches!(
            err,
            StatCacheError::Store(StoreError::Unserializable { .. })
        ));
        assert_eq!(store.get(&fp(1)).unwrap(), None);
        assert!(store.get_years(&fp(1)).unwrap().is_empty());
    }

    #[test]
    fn test_delete_by_year_removes_multi_year_entry() {
        let (store, _dir) = create_test_store();
        let career: Vec<Year> = (2019..=2022).map(Year::new).collect();
        store.put(&fp(1), &rows(0), &career).unwrap();
        store.put(&fp(2), &rows(2019), &[Year::new(2019)]).unwrap();
        store.put(&fp(3), &rows(2022), &[Year::new(2022)]).unwrap();

        assert_eq!(store.delete_by_year(Year::new(2021)).unwrap(), 1);

        assert_eq!(store.get(&fp(1)).unwrap(), None);
        assert!(store.get_years(&fp(1)).unwrap().is_empty());
        assert_eq!(store.get(&fp(2)).unwrap(), Some(rows(2019)));
        assert_eq!(store.get(&fp(3)).unwrap(), Some(rows(2022)));
    }

    #[test]
    fn test_delete_by_year_idempotent() {
        let (store, _dir) = create_test_store();
        store.put(&fp(1), &rows(2021), &[Year::new(2021)]).unwrap();
        assert_eq!(store.delete_by_year(Year::new(2021)).unwrap(), 1);
        assert_eq!(store.delete_by_year(Year::new(2021)).unwrap(), 0);
        assert_eq!(store.delete_by_year(Year::new(1871)).unwrap(), 0);
    }

    #[test]
    fn test_get_many_aligned() {
        let (store, _dir) = create_test_store();
        store.put(&fp(2), &rows(2021), &[Year::new(2021)]).unwrap();

        let entries = store.get_many(&[fp(1), fp(2), fp(3)]).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_none());
        let hit = entries[1].as_ref().unwrap();
        assert_eq!(hit.rows, rows(2021));
        assert_eq!(hit.years, vec![Year::new(2021)]);
        assert!(entries[2].is_none());
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = create_test_store();
        store.put(&fp(1), &rows(2021), &[Year::new(2021)]).unwrap();
        store
            .put(&fp(2), &rows(0), &[Year::new(2020), Year::new(2021)])
            .unwrap();
        store.get(&fp(1)).unwrap();
        store.get(&fp(3)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.year_tag_count, 3);
        assert!(stats.bytes_written > 0);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = LmdbCacheStore::open(temp_dir.path(), 10).unwrap();
            store.put(&fp(1), &rows(2021), &[Year::new(2021)]).unwrap();
        }
        let store = LmdbCacheStore::open(temp_dir.path(), 10).unwrap();
        assert_eq!(store.get(&fp(1)).unwrap(), Some(rows(2021)));
        assert_eq!(store.get_year(&fp(1)).unwrap(), Some(Year::new(2021)));
    }

    #[test]
    fn test_from_settings() {
        let temp_dir = TempDir::new().unwrap();
        let settings = CacheSettings {
            path: temp_dir.path().join("nested").join("lmdb_db"),
            map_size_mb: 10,
            ..CacheSettings::default()
        };
        let store = LmdbCacheStore::from_settings(&settings).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_lmdb_error_maps_to_unavailable() {
        let err: StatCacheError = LmdbStoreError::Transaction("MDB_MAP_FULL".to_string()).into();
        assert!(err.is_store_unavailable());
    }
}
