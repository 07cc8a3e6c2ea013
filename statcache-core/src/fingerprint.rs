//! Canonical key encoding.
//!
//! A fingerprint is the BLAKE3 digest of a descriptor's canonical JSON form
//! for one lookup scope. The canonical form is a `BTreeMap`, so keys are
//! always serialized in lexicographic order, and lists are re-sorted before
//! serialization regardless of how the descriptor was built.
//!
//! Per-year scopes drop `start_year`/`end_year` and carry a single `year`,
//! which is what lets a 2019-2022 request and a 2021-2021 request share the
//! cached 2021 entry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{EncodingError, QueryDescriptor, Year, YearRange};

/// Length of a fingerprint in bytes.
pub const FINGERPRINT_LEN: usize = 32;

/// Cache version used when configuration does not override it.
pub const DEFAULT_CACHE_VERSION: u32 = 1;

/// Fixed-size digest identifying one (descriptor, scope) pair.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a raw key. Returns `None` unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; FINGERPRINT_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let bytes = hex::decode(s).map_err(|e| EncodingError::InvalidValue {
            field: "fingerprint".to_string(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes).ok_or_else(|| EncodingError::InvalidValue {
            field: "fingerprint".to_string(),
            reason: format!("expected {} bytes, got {}", FINGERPRINT_LEN, bytes.len()),
        })
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// What a single cache entry covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupScope {
    /// One season of a per-year/month/game split.
    Year(Year),
    /// The whole range of a career split.
    Range(YearRange),
}

impl LookupScope {
    /// Years a cache entry with this scope is tagged with.
    pub fn tagged_years(&self) -> Vec<Year> {
        match self {
            Self::Year(year) => vec![*year],
            Self::Range(range) => range.years().collect(),
        }
    }
}

impl fmt::Display for LookupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{}", year),
            Self::Range(range) => write!(f, "{}", range),
        }
    }
}

/// Turns descriptors into fingerprints.
///
/// The encoder is stateless apart from the cache version, which is mixed
/// into every fingerprint. Bumping it orphans every existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEncoder {
    cache_version: u32,
}

impl Default for KeyEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_VERSION)
    }
}

impl KeyEncoder {
    pub fn new(cache_version: u32) -> Self {
        Self { cache_version }
    }

    pub fn cache_version(&self) -> u32 {
        self.cache_version
    }

    /// Fingerprint `descriptor` for `scope`.
    ///
    /// The scope must agree with the split: a single year for per-year
    /// splits, the descriptor's own range for career.
    pub fn fingerprint(
        &self,
        descriptor: &QueryDescriptor,
        scope: LookupScope,
    ) -> Result<Fingerprint, EncodingError> {
        let bytes = self.canonical_bytes(descriptor, scope)?;
        Ok(Fingerprint(blake3::hash(&bytes).into()))
    }

    /// Canonical serialization that the fingerprint is computed over.
    pub fn canonical_bytes(
        &self,
        descriptor: &QueryDescriptor,
        scope: LookupScope,
    ) -> Result<Vec<u8>, EncodingError> {
        let canonical = self.canonical_form(descriptor, scope)?;
        serde_json::to_vec(&canonical).map_err(|e| EncodingError::Serialization {
            reason: e.to_string(),
        })
    }

    fn canonical_form(
        &self,
        descriptor: &QueryDescriptor,
        scope: LookupScope,
    ) -> Result<BTreeMap<String, Value>, EncodingError> {
        let mut map = BTreeMap::new();

        for (name, value) in descriptor.filters() {
            let value = serde_json::to_value(value.normalized()).map_err(|e| {
                EncodingError::Serialization {
                    reason: format!("{}: {}", name, e),
                }
            })?;
            map.insert(name.clone(), value);
        }

        map.insert(
            "type".to_string(),
            Value::from(descriptor.stat_type().as_str()),
        );
        map.insert("split".to_string(), Value::from(descriptor.split().as_str()));
        map.insert("find".to_string(), Value::from(descriptor.find().as_str()));
        map.insert(
            "cache_version".to_string(),
            Value::from(self.cache_version),
        );

        match (descriptor.split().is_career(), scope) {
            (false, LookupScope::Year(year)) => {
                map.insert("year".to_string(), Value::from(year.get()));
            }
            (true, LookupScope::Range(range)) if range != descriptor.years() => {
                return Err(EncodingError::ScopeMismatch {
                    reason: format!(
                        "career descriptor over {} fingerprinted for range {}",
                        descriptor.years(),
                        range
                    ),
                })
            }
            (true, LookupScope::Range(range)) => {
                map.insert("start_year".to_string(), Value::from(range.start().get()));
                map.insert("end_year".to_string(), Value::from(range.end().get()));
            }
            (true, LookupScope::Year(year)) => {
                return Err(EncodingError::ScopeMismatch {
                    reason: format!("career descriptor fingerprinted for single year {}", year),
                })
            }
            (false, LookupScope::Range(range)) => {
                return Err(EncodingError::ScopeMismatch {
                    reason: format!(
                        "{} descriptor fingerprinted for range {}",
                        descriptor.split().as_str(),
                        range
                    ),
                })
            }
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter_names, FilterValue, Handedness, Scalar, SplitMode};
    use proptest::prelude::*;

    fn range(start: u16, end: u16) -> YearRange {
        YearRange::new(Year::new(start), Year::new(end)).unwrap()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let enc = KeyEncoder::default();
        let d = QueryDescriptor::batting(range(2019, 2019)).with_batter_handedness(Handedness::L);
        let a = enc.fingerprint(&d, LookupScope::Year(Year::new(2019))).unwrap();
        let b = enc.fingerprint(&d, LookupScope::Year(Year::new(2019))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_bytes_are_lexicographic() {
        let enc = KeyEncoder::default();
        let d = QueryDescriptor::batting(range(2019, 2019))
            .with_filter("zeta", 1i64)
            .unwrap()
            .with_filter("alpha", "x")
            .unwrap();
        let bytes = enc
            .canonical_bytes(&d, LookupScope::Year(Year::new(2019)))
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"{"alpha":"x","cache_version":1,"find":"player","split":"year","type":"batting","year":2019,"zeta":1}"#
        );
    }

    #[test]
    fn test_year_range_independence() {
        let enc = KeyEncoder::default();
        let wide = QueryDescriptor::batting(range(2019, 2022)).with_outs([0, 1]);
        let narrow = QueryDescriptor::batting(range(2021, 2021)).with_outs([0, 1]);
        let year = LookupScope::Year(Year::new(2021));
        assert_eq!(
            enc.fingerprint(&wide, year).unwrap(),
            enc.fingerprint(&narrow, year).unwrap()
        );
    }

    #[test]
    fn test_career_fingerprint_depends_on_range() {
        let enc = KeyEncoder::default();
        let a = QueryDescriptor::batting(range(2019, 2022)).with_split(SplitMode::Career);
        let b = QueryDescriptor::batting(range(2019, 2021)).with_split(SplitMode::Career);
        assert_ne!(
            enc.fingerprint(&a, LookupScope::Range(a.years())).unwrap(),
            enc.fingerprint(&b, LookupScope::Range(b.years())).unwrap()
        );
    }

    #[test]
    fn test_filter_value_changes_fingerprint() {
        let enc = KeyEncoder::default();
        let left =
            QueryDescriptor::batting(range(2019, 2019)).with_batter_handedness(Handedness::L);
        let right =
            QueryDescriptor::batting(range(2019, 2019)).with_batter_handedness(Handedness::R);
        let scope = LookupScope::Year(Year::new(2019));
        assert_ne!(
            enc.fingerprint(&left, scope).unwrap(),
            enc.fingerprint(&right, scope).unwrap()
        );
    }

    #[test]
    fn test_split_and_type_change_fingerprint() {
        let enc = KeyEncoder::default();
        let scope = LookupScope::Year(Year::new(2019));
        let batting = QueryDescriptor::batting(range(2019, 2019));
        let pitching = QueryDescriptor::pitching(range(2019, 2019));
        let monthly = batting.clone().with_split(SplitMode::Month);
        let a = enc.fingerprint(&batting, scope).unwrap();
        assert_ne!(a, enc.fingerprint(&pitching, scope).unwrap());
        assert_ne!(a, enc.fingerprint(&monthly, scope).unwrap());
    }

    #[test]
    fn test_cache_version_changes_fingerprint() {
        let d = QueryDescriptor::batting(range(2019, 2019));
        let scope = LookupScope::Year(Year::new(2019));
        assert_ne!(
            KeyEncoder::new(1).fingerprint(&d, scope).unwrap(),
            KeyEncoder::new(2).fingerprint(&d, scope).unwrap()
        );
    }

    #[test]
    fn test_scope_mismatch_rejected() {
        let enc = KeyEncoder::default();
        let career = QueryDescriptor::batting(range(2019, 2022)).with_split(SplitMode::Career);
        let per_year = QueryDescriptor::batting(range(2019, 2022));

        let err = enc
            .fingerprint(&career, LookupScope::Year(Year::new(2019)))
            .unwrap_err();
        assert!(matches!(err, EncodingError::ScopeMismatch { .. }));

        let err = enc
            .fingerprint(&per_year, LookupScope::Range(per_year.years()))
            .unwrap_err();
        assert!(matches!(err, EncodingError::ScopeMismatch { .. }));

        let err = enc
            .fingerprint(&career, LookupScope::Range(range(2019, 2021)))
            .unwrap_err();
        assert!(matches!(err, EncodingError::ScopeMismatch { .. }));
    }

    #[test]
    fn test_hex_round_trip() {
        let enc = KeyEncoder::default();
        let d = QueryDescriptor::pitching(range(2020, 2020));
        let fp = enc.fingerprint(&d, LookupScope::Year(Year::new(2020))).unwrap();
        assert_eq!(fp.to_hex().len(), FINGERPRINT_LEN * 2);
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()).unwrap(), fp);
        assert!(Fingerprint::from_hex("abcd").is_err());
        assert!(Fingerprint::from_hex("not hex").is_err());
    }

    #[test]
    fn test_tagged_years() {
        assert_eq!(
            LookupScope::Year(Year::new(2020)).tagged_years(),
            vec![Year::new(2020)]
        );
        assert_eq!(LookupScope::Range(range(2019, 2022)).tagged_years().len(), 4);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Permuting list-valued filters never changes the fingerprint.
        #[test]
        fn prop_list_order_invariance(
            innings in prop::collection::vec(1i64..12, 0..8),
            teams in prop::collection::vec("[A-Z]{3}", 0..6),
            seed in any::<u64>(),
        ) {
            let enc = KeyEncoder::default();
            let mut shuffled_innings = innings.clone();
            let mut shuffled_teams = teams.clone();
            let n = shuffled_innings.len().max(1);
            shuffled_innings.rotate_left((seed as usize) % n);
            shuffled_innings.reverse();
            let m = shuffled_teams.len().max(1);
            shuffled_teams.rotate_left((seed as usize) % m);

            let a = QueryDescriptor::batting(range(2019, 2019))
                .with_innings(innings)
                .with_batting_teams(teams);
            let b = QueryDescriptor::batting(range(2019, 2019))
                .with_innings(shuffled_innings)
                .with_batting_teams(shuffled_teams);

            let scope = LookupScope::Year(Year::new(2019));
            prop_assert_eq!(
                enc.fingerprint(&a, scope).unwrap(),
                enc.fingerprint(&b, scope).unwrap()
            );
        }

        /// Raw unsorted lists inserted through the open filter set are
        /// canonicalized the same way as the typed setters.
        #[test]
        fn prop_open_filters_sorted(values in prop::collection::vec(-5i64..5, 1..8)) {
            let enc = KeyEncoder::default();
            let open = QueryDescriptor::batting(range(2020, 2020))
                .with_filter(
                    filter_names::SCORE_DIFF,
                    FilterValue::List(values.iter().copied().map(Scalar::Int).collect()),
                )
                .unwrap();
            let typed = QueryDescriptor::batting(range(2020, 2020)).with_score_diff(values);
            let scope = LookupScope::Year(Year::new(2020));
            prop_assert_eq!(
                enc.fingerprint(&open, scope).unwrap(),
                enc.fingerprint(&typed, scope).unwrap()
            );
        }

        /// Any year inside two overlapping ranges gets the same per-year key.
        #[test]
        fn prop_year_range_independence(
            start_a in 1990u16..2020,
            start_b in 1990u16..2020,
            len_a in 0u16..10,
            len_b in 0u16..10,
        ) {
            let enc = KeyEncoder::default();
            let a = range(start_a, start_a + len_a);
            let b = range(start_b, start_b + len_b);
            let da = QueryDescriptor::pitching(a);
            let db = QueryDescriptor::pitching(b);
            for year in a.years().filter(|y| b.contains(*y)) {
                let scope = LookupScope::Year(year);
                prop_assert_eq!(
                    enc.fingerprint(&da, scope).unwrap(),
                    enc.fingerprint(&db, scope).unwrap()
                );
            }
        }
    }
}
