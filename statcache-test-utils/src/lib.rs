//! statcache Test Utilities
//!
//! Shared test infrastructure for the statcache workspace:
//! - A scripted statistics engine
//! - Proptest generators for descriptors and rows
//! - Fixtures for common scenarios
//! - Assertions over statcache errors

pub use statcache_core::{
    ComputationError, EngineScope, FilterValue, FindMode, Handedness, QueryDescriptor, Scalar,
    SplitMode, StatCacheError, StatCacheResult, StatRow, StatType, StatValue, StatsEngine,
    StoreError, Year, YearRange,
};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// FAKE STATISTICS ENGINE
// ============================================================================

/// Deterministic statistics engine for tests.
///
/// Produces two rows per requested season (one aggregated row per player
/// for career), counts its calls, and can be scripted to fail, return
/// nothing, or emit a non-finite value.
#[derive(Debug, Default)]
pub struct FakeStatsEngine {
    failing: BTreeSet<Year>,
    empty: BTreeSet<Year>,
    nan_column: Option<String>,
    calls: AtomicUsize,
    last_scope: Mutex<Option<EngineScope>>,
}

/// Players every fake season is computed for.
pub const FAKE_PLAYERS: [&str; 2] = ["troutmi01", "judgeaa01"];

impl FakeStatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any computation that touches `year`.
    pub fn failing_on(mut self, year: Year) -> Self {
        self.failing.insert(year);
        self
    }

    /// Return no rows for `year`.
    pub fn empty_on(mut self, year: Year) -> Self {
        self.empty.insert(year);
        self
    }

    /// Put a NaN into `column` of every row.
    pub fn with_nan_column(mut self, column: impl Into<String>) -> Self {
        self.nan_column = Some(column.into());
        self
    }

    /// Number of `compute` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Scope of the most recent `compute` call.
    pub fn last_scope(&self) -> Option<EngineScope> {
        self.last_scope.lock().ok().and_then(|s| s.clone())
    }

    fn finish(&self, mut row: StatRow) -> StatRow {
        if let Some(column) = &self.nan_column {
            row.insert(column.clone(), f64::NAN);
        }
        row
    }

    fn season_rows(&self, descriptor: &QueryDescriptor, year: Year) -> Vec<StatRow> {
        if self.empty.contains(&year) {
            return Vec::new();
        }
        FAKE_PLAYERS
            .iter()
            .enumerate()
            .map(|(i, player)| {
                self.finish(
                    StatRow::new()
                        .with("year", i64::from(year.get()))
                        .with("player_id", *player)
                        .with("type", descriptor.stat_type().as_str())
                        .with("G", fake_games(year, i))
                        .with("AVG", fake_rate(year, i)),
                )
            })
            .collect()
    }

    fn career_rows(&self, descriptor: &QueryDescriptor, range: YearRange) -> Vec<StatRow> {
        FAKE_PLAYERS
            .iter()
            .enumerate()
            .map(|(i, player)| {
                let games: i64 = range
                    .years()
                    .filter(|y| !self.empty.contains(y))
                    .map(|y| fake_games(y, i))
                    .sum();
                self.finish(
                    StatRow::new()
                        .with("year", StatValue::Null)
                        .with("start_year", i64::from(range.start().get()))
                        .with("end_year", i64::from(range.end().get()))
                        .with("player_id", *player)
                        .with("type", descriptor.stat_type().as_str())
                        .with("G", games),
                )
            })
            .collect()
    }
}

fn fake_games(year: Year, player: usize) -> i64 {
    i64::from(year.get() % 100) + 100 + player as i64
}

/// Batting average in whole thousandths.
fn fake_rate(year: Year, player: usize) -> f64 {
    let thousandths = 200 + u32::from(year.get() % 10) * 10 + player as u32;
    f64::from(thousandths) / 1000.0
}

impl StatsEngine for FakeStatsEngine {
    fn compute(
        &self,
        descriptor: &QueryDescriptor,
        scope: &EngineScope,
    ) -> Result<Vec<StatRow>, ComputationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_scope.lock() {
            *last = Some(scope.clone());
        }

        let failed: Vec<Year> = scope
            .years()
            .into_iter()
            .filter(|y| self.failing.contains(y))
            .collect();
        if !failed.is_empty() {
            return Err(ComputationError::Failed {
                years: failed,
                reason: "scripted failure".to_string(),
            });
        }

        Ok(match scope {
            EngineScope::Years(years) => years
                .iter()
                .flat_map(|y| self.season_rows(descriptor, *y))
                .collect(),
            EngineScope::Range(range) => self.career_rows(descriptor, *range),
        })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for statcache types.

    use super::*;
    use proptest::prelude::*;

    /// A season in the modern play-by-play era.
    pub fn arb_year() -> impl Strategy<Value = Year> {
        (1950u16..=2030).prop_map(Year::new)
    }

    /// A range of at most ten seasons.
    pub fn arb_year_range() -> impl Strategy<Value = YearRange> {
        (1950u16..=2030, 0u16..10).prop_map(|(start, len)| {
            let end = start.saturating_add(len).min(2030);
            YearRange::new(Year::new(start), Year::new(end))
                .unwrap_or_else(|_| YearRange::single(Year::new(start)))
        })
    }

    pub fn arb_stat_type() -> impl Strategy<Value = StatType> {
        prop_oneof![Just(StatType::Batting), Just(StatType::Pitching)]
    }

    pub fn arb_split_mode() -> impl Strategy<Value = SplitMode> {
        prop_oneof![
            Just(SplitMode::Career),
            Just(SplitMode::Year),
            Just(SplitMode::Month),
            Just(SplitMode::Game),
        ]
    }

    pub fn arb_find_mode() -> impl Strategy<Value = FindMode> {
        prop_oneof![Just(FindMode::Player), Just(FindMode::Team)]
    }

    pub fn arb_handedness() -> impl Strategy<Value = Handedness> {
        prop_oneof![Just(Handedness::L), Just(Handedness::R)]
    }

    pub fn arb_scalar() -> impl Strategy<Value = Scalar> {
        prop_oneof![
            any::<bool>().prop_map(Scalar::Bool),
            (-20i64..20).prop_map(Scalar::Int),
            "[A-Z]{3}".prop_map(Scalar::Str),
        ]
    }

    /// A filter value, scalar or flat list.
    pub fn arb_filter_value() -> impl Strategy<Value = FilterValue> {
        prop_oneof![
            arb_scalar().prop_map(FilterValue::Scalar),
            prop::collection::vec(arb_scalar(), 0..6).prop_map(FilterValue::List),
        ]
    }

    /// Open-ended filter names that never collide with reserved keys.
    pub fn arb_filter_name() -> impl Strategy<Value = String> {
        "f_[a-z]{1,12}"
    }

    /// A full descriptor with up to four open filters and optional typed ones.
    pub fn arb_descriptor() -> impl Strategy<Value = QueryDescriptor> {
        (
            arb_stat_type(),
            arb_split_mode(),
            arb_find_mode(),
            arb_year_range(),
            prop::option::of(arb_handedness()),
            prop::option::of(prop::collection::vec(1i64..=9, 1..5)),
            prop::collection::btree_map(arb_filter_name(), arb_filter_value(), 0..4),
        )
            .prop_map(|(stat_type, split, find, years, hand, innings, filters)| {
                let mut descriptor = QueryDescriptor::new(stat_type, years)
                    .with_split(split)
                    .with_find(find);
                if let Some(hand) = hand {
                    descriptor = descriptor.with_batter_handedness(hand);
                }
                if let Some(innings) = innings {
                    descriptor = descriptor.with_innings(innings);
                }
                for (name, value) in filters {
                    descriptor = match descriptor.clone().with_filter(name, value) {
                        Ok(d) => d,
                        Err(_) => descriptor,
                    };
                }
                descriptor
            })
    }

    /// A finite stat value, as the engine emits after sanitizing.
    ///
    /// Floats are kept to three decimals so they survive a JSON round trip
    /// bit for bit.
    pub fn arb_stat_value() -> impl Strategy<Value = StatValue> {
        prop_oneof![
            any::<bool>().prop_map(StatValue::Bool),
            any::<i64>().prop_map(StatValue::Int),
            (-1_000_000i64..1_000_000).prop_map(|n| StatValue::Float(n as f64 / 1000.0)),
            "[a-z0-9]{0,10}".prop_map(StatValue::Text),
        ]
    }

    /// A row for `year` with a handful of stat columns.
    pub fn arb_row(year: Year) -> impl Strategy<Value = StatRow> {
        (
            "[a-z]{5}[0-9]{2}",
            prop::collection::btree_map("[A-Z]{1,4}", arb_stat_value(), 0..6),
        )
            .prop_map(move |(player, stats)| {
                let mut row = StatRow::new()
                    .with("year", i64::from(year.get()))
                    .with("player_id", player);
                for (column, value) in stats {
                    row.insert(column, value);
                }
                row
            })
    }

    pub fn arb_rows(year: Year) -> impl Strategy<Value = Vec<StatRow>> {
        prop::collection::vec(arb_row(year), 0..8)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built descriptors and rows for common scenarios.

    use super::*;

    pub fn range(start: u16, end: u16) -> YearRange {
        YearRange::new(Year::new(start), Year::new(end)).unwrap_or_else(|_| {
            YearRange::single(Year::new(start))
        })
    }

    /// Left-handed batting, 2019 only.
    pub fn lefty_batting_2019() -> QueryDescriptor {
        QueryDescriptor::batting(range(2019, 2019)).with_batter_handedness(Handedness::L)
    }

    /// Batting career over 2019-2022.
    pub fn batting_career_2019_2022() -> QueryDescriptor {
        QueryDescriptor::batting(range(2019, 2022)).with_split(SplitMode::Career)
    }

    /// Pitching with a late-inning, two-out filter set.
    pub fn late_inning_pitching(start: u16, end: u16) -> QueryDescriptor {
        QueryDescriptor::pitching(range(start, end))
            .with_innings([7, 8, 9])
            .with_outs([2])
            .with_pitcher_home(true)
    }

    /// The raw parameter object a request layer would hand over.
    pub fn lefty_batting_params() -> serde_json::Map<String, serde_json::Value> {
        let value = serde_json::json!({
            "type": "batting",
            "split": "year",
            "start_year": 2019,
            "end_year": 2019,
            "batter_handedness_pa": "L",
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// A simple row for `year`.
    pub fn row(year: u16, player: &str) -> StatRow {
        StatRow::new()
            .with("year", i64::from(year))
            .with("player_id", player)
            .with("HR", 30i64)
    }
}

// ============================================================================
// TEST ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over statcache results.

    use super::*;

    /// Assert that a result is an encoding error.
    pub fn assert_encoding_error<T: std::fmt::Debug>(result: &StatCacheResult<T>) {
        match result {
            Err(StatCacheError::Encoding(_)) => {}
            other => panic!("Expected encoding error, got {:?}", other),
        }
    }

    /// Assert that a result is a computation failure.
    pub fn assert_computation_error<T: std::fmt::Debug>(result: &StatCacheResult<T>) {
        match result {
            Err(StatCacheError::Computation(_)) => {}
            other => panic!("Expected computation error, got {:?}", other),
        }
    }

    /// Assert that a result is a store error.
    pub fn assert_store_error<T: std::fmt::Debug>(result: &StatCacheResult<T>) {
        match result {
            Err(StatCacheError::Store(_)) => {}
            other => panic!("Expected store error, got {:?}", other),
        }
    }

    /// Assert that two row-sets hold the same rows regardless of order.
    pub fn assert_same_rows(left: &[StatRow], right: &[StatRow]) {
        let key = |r: &StatRow| serde_json::to_string(r).unwrap_or_default();
        let mut l: Vec<String> = left.iter().map(key).collect();
        let mut r: Vec<String> = right.iter().map(key).collect();
        l.sort();
        r.sort();
        assert_eq!(l, r, "row-sets differ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fake_engine_per_year_rows() {
        let engine = FakeStatsEngine::new().empty_on(Year::new(2021));
        let rows = engine
            .compute(
                &fixtures::lefty_batting_2019(),
                &EngineScope::Years(vec![Year::new(2020), Year::new(2021)]),
            )
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.year() == Some(Year::new(2020))));
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_fake_engine_failure_names_years() {
        let engine = FakeStatsEngine::new().failing_on(Year::new(2020));
        let err = engine
            .compute(
                &fixtures::lefty_batting_2019(),
                &EngineScope::Years(vec![Year::new(2019), Year::new(2020)]),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ComputationError::Failed {
                years: vec![Year::new(2020)],
                reason: "scripted failure".to_string(),
            }
        );
    }

    #[test]
    fn test_fake_engine_career_rows() {
        let engine = FakeStatsEngine::new();
        let rows = engine
            .compute(
                &fixtures::batting_career_2019_2022(),
                &EngineScope::Range(fixtures::range(2019, 2022)),
            )
            .unwrap();
        assert_eq!(rows.len(), FAKE_PLAYERS.len());
        assert!(rows.iter().all(|r| r.year().is_none()));
        assert_eq!(
            engine.last_scope(),
            Some(EngineScope::Range(fixtures::range(2019, 2022)))
        );
    }

    #[test]
    fn test_fixture_params_parse() {
        let d = QueryDescriptor::from_params(&fixtures::lefty_batting_params(), Year::new(2024))
            .unwrap();
        assert_eq!(d, fixtures::lefty_batting_2019());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_rows_are_storable(rows in generators::arb_rows(Year::new(2020))) {
            prop_assert!(rows.iter().all(StatRow::is_storable));
            prop_assert!(rows.iter().all(|r| r.year() == Some(Year::new(2020))));
        }

        #[test]
        fn prop_generated_descriptors_stay_in_range(d in generators::arb_descriptor()) {
            prop_assert!(d.years().start() <= d.years().end());
        }
    }
}
