//! Year-tag keys for the `years` table.
//!
//! A fingerprint may carry several year tags (a career entry is tagged with
//! every year of its range), so tags live in their own table keyed by the
//! fingerprint followed by the year.
//!
//! # Binary Format
//!
//! The key encodes to a fixed 34-byte array:
//! - Bytes 0-31: fingerprint
//! - Bytes 32-33: year (big-endian u16)
//!
//! Keys sort by fingerprint first, so all tags of one entry form a
//! contiguous prefix range.

use statcache_core::{Fingerprint, Year, FINGERPRINT_LEN};

/// Encoded length of a [`YearTagKey`].
pub const YEAR_TAG_KEY_LEN: usize = FINGERPRINT_LEN + 2;

/// Key of one (fingerprint, year) association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearTagKey {
    fingerprint: Fingerprint,
    year: Year,
}

impl YearTagKey {
    pub fn new(fingerprint: Fingerprint, year: Year) -> Self {
        Self { fingerprint, year }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn encode(&self) -> [u8; YEAR_TAG_KEY_LEN] {
        let mut bytes = [0u8; YEAR_TAG_KEY_LEN];
        bytes[..FINGERPRINT_LEN].copy_from_slice(self.fingerprint.as_bytes());
        bytes[FINGERPRINT_LEN..].copy_from_slice(&self.year.to_be_bytes());
        bytes
    }

    /// Decode a key from bytes. `None` unless exactly 34 bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != YEAR_TAG_KEY_LEN {
            return None;
        }
        let fingerprint = Fingerprint::from_slice(&bytes[..FINGERPRINT_LEN])?;
        let year = Year::from_be_bytes([bytes[FINGERPRINT_LEN], bytes[FINGERPRINT_LEN + 1]]);
        Some(Self { fingerprint, year })
    }

    /// Prefix covering every tag of `fingerprint`.
    pub fn fingerprint_prefix(fingerprint: &Fingerprint) -> [u8; FINGERPRINT_LEN] {
        *fingerprint.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    #[test]
    fn test_encode_layout() {
        let key = YearTagKey::new(fp(0xAB), Year::new(2021));
        let bytes = key.encode();
        assert_eq!(&bytes[..32], &[0xAB; 32]);
        assert_eq!(&bytes[32..], &2021u16.to_be_bytes());
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(YearTagKey::decode(&[0u8; 33]).is_none());
        assert!(YearTagKey::decode(&[0u8; 35]).is_none());
        assert!(YearTagKey::decode(&[]).is_none());
    }

    #[test]
    fn test_prefix_matches_encoded_key() {
        let key = YearTagKey::new(fp(7), Year::new(1999));
        let prefix = YearTagKey::fingerprint_prefix(&fp(7));
        assert!(key.encode().starts_with(&prefix));
        assert!(!YearTagKey::new(fp(8), Year::new(1999))
            .encode()
            .starts_with(&prefix));
    }

    #[test]
    fn test_years_sort_within_fingerprint() {
        let early = YearTagKey::new(fp(1), Year::new(1999)).encode();
        let late = YearTagKey::new(fp(1), Year::new(2021)).encode();
        assert!(early < late);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_decode_inverts_encode(
            bytes in prop::array::uniform32(any::<u8>()),
            year in any::<u16>(),
        ) {
            let key = YearTagKey::new(Fingerprint::from_bytes(bytes), Year::new(year));
            prop_assert_eq!(YearTagKey::decode(&key.encode()), Some(key));
        }
    }
}
