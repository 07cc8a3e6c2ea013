//! Statistic rows produced by the engine and stored in the cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Year;

/// Placeholder for non-finite or missing numeric cells.
pub const NAN_PLACEHOLDER: &str = "NaN";

/// Placeholder for missing identity cells.
pub const NA_PLACEHOLDER: &str = "N/A";

/// Columns that identify a row rather than measure it.
pub const IDENTITY_COLUMNS: &[&str] = &[
    "year",
    "player_id",
    "team",
    "month",
    "day",
    "game_id",
    "start_year",
    "end_year",
];

/// One cell of a statistic row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl StatValue {
    /// True if this cell can be written to the cache without loss.
    pub fn is_storable(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl From<i64> for StatValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StatValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for StatValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for StatValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single row of engine output, keyed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatRow {
    columns: BTreeMap<String, StatValue>,
}

impl StatRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<StatValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<StatValue>) {
        self.columns.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&StatValue> {
        self.columns.get(column)
    }

    pub fn columns(&self) -> &BTreeMap<String, StatValue> {
        &self.columns
    }

    /// The season this row belongs to, if its `year` cell is an integer.
    ///
    /// Career rows carry a text sentinel here and return `None`.
    pub fn year(&self) -> Option<Year> {
        match self.columns.get("year") {
            Some(StatValue::Int(v)) => u16::try_from(*v).ok().map(Year::new),
            _ => None,
        }
    }

    /// True if every cell can be written to the cache.
    pub fn is_storable(&self) -> bool {
        self.columns.values().all(StatValue::is_storable)
    }

    /// Name of the first cell that cannot be stored, if any.
    pub fn first_unstorable(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|(_, v)| !v.is_storable())
            .map(|(k, _)| k.as_str())
    }

    /// Replace non-finite floats and nulls with stable text placeholders.
    ///
    /// Nulls in identity columns become `"N/A"`; every other null or
    /// non-finite float becomes `"NaN"`.
    pub fn sanitize(&mut self) {
        for (column, value) in self.columns.iter_mut() {
            let replace = match value {
                StatValue::Float(f) if !f.is_finite() => Some(NAN_PLACEHOLDER),
                StatValue::Null if IDENTITY_COLUMNS.contains(&column.as_str()) => {
                    Some(NA_PLACEHOLDER)
                }
                StatValue::Null => Some(NAN_PLACEHOLDER),
                _ => None,
            };
            if let Some(text) = replace {
                *value = StatValue::Text(text.to_string());
            }
        }
    }
}

/// Sanitize every row in place.
pub fn sanitize_rows(rows: &mut [StatRow]) {
    for row in rows.iter_mut() {
        row.sanitize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_extraction() {
        let row = StatRow::new().with("year", 2021i64);
        assert_eq!(row.year(), Some(Year::new(2021)));

        let career = StatRow::new().with("year", NA_PLACEHOLDER);
        assert_eq!(career.year(), None);

        assert_eq!(StatRow::new().year(), None);
        assert_eq!(StatRow::new().with("year", -4i64).year(), None);
    }

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let mut row = StatRow::new()
            .with("year", 2020i64)
            .with("AVG", f64::NAN)
            .with("OPS", f64::INFINITY)
            .with("ERA", f64::NEG_INFINITY)
            .with("PA", 10i64);
        assert!(!row.is_storable());

        row.sanitize();

        assert!(row.is_storable());
        assert_eq!(row.get("AVG"), Some(&StatValue::Text("NaN".to_string())));
        assert_eq!(row.get("OPS"), Some(&StatValue::Text("NaN".to_string())));
        assert_eq!(row.get("ERA"), Some(&StatValue::Text("NaN".to_string())));
        assert_eq!(row.get("PA"), Some(&StatValue::Int(10)));
    }

    #[test]
    fn test_sanitize_nulls_by_column_kind() {
        let mut row = StatRow::new()
            .with("team", StatValue::Null)
            .with("SLG", StatValue::Null);
        row.sanitize();
        assert_eq!(row.get("team"), Some(&StatValue::Text("N/A".to_string())));
        assert_eq!(row.get("SLG"), Some(&StatValue::Text("NaN".to_string())));
    }

    #[test]
    fn test_first_unstorable() {
        let row = StatRow::new().with("a", 1.0).with("b", f64::NAN);
        assert_eq!(row.first_unstorable(), Some("b"));
        assert_eq!(StatRow::new().with("a", 1.0).first_unstorable(), None);
    }

    #[test]
    fn test_json_shape() {
        let row = StatRow::new()
            .with("year", 2019i64)
            .with("player_id", "troum001")
            .with("AVG", 0.25);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"AVG":0.25,"player_id":"troum001","year":2019}"#);
        let back: StatRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
