//! Season years and inclusive year ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EncodingError;

/// A season year.
///
/// Stored as a `u16`, which covers every season in the dataset and gives the
/// fixed two-byte big-endian encoding used for year tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(u16);

impl Year {
    pub const fn new(year: u16) -> Self {
        Self(year)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Encode as a fixed-width big-endian tag.
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub const fn from_be_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Convert from a row or parameter integer, rejecting anything outside `u16`.
    pub fn try_from_i64(field: &str, value: i64) -> Result<Self, EncodingError> {
        u16::try_from(value)
            .map(Self)
            .map_err(|_| EncodingError::InvalidValue {
                field: field.to_string(),
                reason: format!("{} is not a valid year", value),
            })
    }
}

impl From<u16> for Year {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of seasons, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawYearRange")]
pub struct YearRange {
    start: Year,
    end: Year,
}

#[derive(Deserialize)]
struct RawYearRange {
    start: Year,
    end: Year,
}

impl TryFrom<RawYearRange> for YearRange {
    type Error = EncodingError;

    fn try_from(raw: RawYearRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl YearRange {
    /// Build a range. Fails if `start > end`.
    pub fn new(start: Year, end: Year) -> Result<Self, EncodingError> {
        if start > end {
            return Err(EncodingError::InvalidValue {
                field: "start_year".to_string(),
                reason: format!("start_year {} is after end_year {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn single(year: Year) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    pub fn start(&self) -> Year {
        self.start
    }

    pub fn end(&self) -> Year {
        self.end
    }

    pub fn contains(&self, year: Year) -> bool {
        self.start <= year && year <= self.end
    }

    /// Number of seasons covered.
    pub fn len(&self) -> usize {
        usize::from(self.end.0 - self.start.0) + 1
    }

    /// A valid range always covers at least one season.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn years(&self) -> impl Iterator<Item = Year> {
        (self.start.0..=self.end.0).map(Year)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
