//! Cache store trait and statistics.
//!
//! A store maps fingerprints to row-sets and tags every entry with the years
//! it covers. Implementations must keep the two associations in step: a
//! row-set without year tags is unreachable by invalidation and must never
//! be observable.

use std::collections::BTreeSet;

use statcache_core::{Fingerprint, StatCacheResult, StatRow, StoreError, Year};

/// One cached entry as read back from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
    pub rows: Vec<StatRow>,
    /// Year tags of the entry, ascending. Never empty.
    pub years: Vec<Year>,
}

impl CachedEntry {
    pub fn year_set(&self) -> BTreeSet<Year> {
        self.years.iter().copied().collect()
    }
}

/// Persistent fingerprint -> row-set mapping with year tags.
///
/// All operations are synchronous and safe to call from many threads.
/// Callers on an async runtime go through
/// [`AsyncQueryResolver`](crate::AsyncQueryResolver), which moves store work
/// onto the blocking pool.
pub trait CacheStore: Send + Sync {
    /// Row-set stored under `fingerprint`, or `None`.
    ///
    /// An entry holding an empty row-set returns `Some(vec![])`.
    fn get(&self, fingerprint: &Fingerprint) -> StatCacheResult<Option<Vec<StatRow>>>;

    /// Every year tag of `fingerprint`, ascending. Empty when absent.
    fn get_years(&self, fingerprint: &Fingerprint) -> StatCacheResult<Vec<Year>>;

    /// Lowest year tag of `fingerprint`.
    ///
    /// Per-year entries carry exactly one tag, so this is the year of the
    /// entry.
    fn get_year(&self, fingerprint: &Fingerprint) -> StatCacheResult<Option<Year>> {
        Ok(self.get_years(fingerprint)?.into_iter().next())
    }

    /// Look up many fingerprints against a single consistent snapshot.
    ///
    /// The result is positionally aligned with `fingerprints`.
    fn get_many(&self, fingerprints: &[Fingerprint]) -> StatCacheResult<Vec<Option<CachedEntry>>>;

    /// Write `rows` under `fingerprint` tagged with `years`, atomically.
    ///
    /// Replaces any previous row-set and tag set for the fingerprint.
    /// Fails with [`StoreError::MissingYearTags`] when `years` is empty and
    /// [`StoreError::Unserializable`] when a row holds a non-finite float.
    fn put(
        &self,
        fingerprint: &Fingerprint,
        rows: &[StatRow],
        years: &[Year],
    ) -> StatCacheResult<()>;

    /// Remove every entry tagged with `year`, including its other tags.
    ///
    /// Returns the number of entries removed. Removing nothing is not an
    /// error.
    fn delete_by_year(&self, year: Year) -> StatCacheResult<u64>;

    /// Current statistics.
    fn stats(&self) -> StatCacheResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found an entry since the store was opened.
    pub hits: u64,
    /// Lookups that found nothing since the store was opened.
    pub misses: u64,
    /// Number of entries currently stored.
    pub entry_count: u64,
    /// Number of year tags currently stored.
    pub year_tag_count: u64,
    /// Encoded row-set bytes written since the store was opened.
    pub bytes_written: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared validation and encoding for `put`.
pub(crate) fn encode_rows(
    fingerprint: &Fingerprint,
    rows: &[StatRow],
    years: &[Year],
) -> Result<Vec<u8>, StoreError> {
    if years.is_empty() {
        return Err(StoreError::MissingYearTags {
            fingerprint: fingerprint.to_hex(),
        });
    }
    if let Some(column) = rows.iter().find_map(StatRow::first_unstorable) {
        return Err(StoreError::Unserializable {
            fingerprint: fingerprint.to_hex(),
            reason: format!("column {:?} holds a non-finite float", column),
        });
    }
    serde_json::to_vec(rows).map_err(|e| StoreError::Unserializable {
        fingerprint: fingerprint.to_hex(),
        reason: e.to_string(),
    })
}

pub(crate) fn decode_rows(
    fingerprint: &Fingerprint,
    bytes: &[u8],
) -> Result<Vec<StatRow>, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        fingerprint: fingerprint.to_hex(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use statcache_core::FINGERPRINT_LEN;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_encode_rejects_empty_tags() {
        let fp = Fingerprint::from_bytes([1; FINGERPRINT_LEN]);
        let err = encode_rows(&fp, &[], &[]).unwrap_err();
        assert!(matches!(err, StoreError::MissingYearTags { .. }));
    }

    #[test]
    fn test_encode_rejects_nan() {
        let fp = Fingerprint::from_bytes([1; FINGERPRINT_LEN]);
        let row = StatRow::new().with("year", 2020i64).with("AVG", f64::NAN);
        let err = encode_rows(&fp, &[row], &[Year::new(2020)]).unwrap_err();
        match err {
            StoreError::Unserializable { reason, .. } => assert!(reason.contains("AVG")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_corrupt_payload() {
        let fp = Fingerprint::from_bytes([2; FINGERPRINT_LEN]);
        let err = decode_rows(&fp, b"{not json").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_encode_then_decode_empty_row_set() {
        let fp = Fingerprint::from_bytes([3; FINGERPRINT_LEN]);
        let bytes = encode_rows(&fp, &[], &[Year::new(2020)]).unwrap();
        assert_eq!(decode_rows(&fp, &bytes).unwrap(), Vec::<StatRow>::new());
    }
}
