//! Query descriptors.
//!
//! A [`QueryDescriptor`] is the normalized, strongly typed form of one
//! statistics request. Every parameter that can change the engine's answer
//! lives in the descriptor, and everything in the descriptor takes part in
//! the fingerprint, so a filter cannot be applied by the engine yet skipped
//! by the cache key.
//!
//! List-valued filters are sorted on insertion, which makes the descriptor
//! itself independent of the order the request listed them in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{EncodingError, Year, YearRange};

/// Keys owned by the canonical form. Filters may not use them.
pub const RESERVED_KEYS: &[&str] = &[
    "type",
    "split",
    "find",
    "year",
    "start_year",
    "end_year",
    "cache_version",
];

/// Names of the filters the statistics engine understands.
pub mod filter_names {
    pub const BATTER_HANDEDNESS_PA: &str = "batter_handedness_pa";
    pub const PITCHER_HANDEDNESS: &str = "pitcher_handedness";
    pub const BATTER_STARTER: &str = "batter_starter";
    pub const PITCHER_STARTER: &str = "pitcher_starter";
    pub const BATTER_LINEUP_POS: &str = "batter_lineup_pos";
    pub const PLAYER_FIELD_POSITION: &str = "player_field_position";
    pub const BATTER_HOME: &str = "batter_home";
    pub const PITCHER_HOME: &str = "pitcher_home";
    pub const DAYS_OF_WEEK: &str = "days_of_week";
    pub const PITCHING_TEAM: &str = "pitching_team";
    pub const BATTING_TEAM: &str = "batting_team";
    pub const INNINGS: &str = "innings";
    pub const OUTS: &str = "outs";
    pub const STRIKES: &str = "strikes";
    pub const BALLS: &str = "balls";
    pub const SCORE_DIFF: &str = "score_diff";
    pub const HOME_SCORE: &str = "home_score";
    pub const AWAY_SCORE: &str = "away_score";
    pub const BASE_SITUATION: &str = "base_situation";
}

/// Statistical domain of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatType {
    Batting,
    Pitching,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batting => "batting",
            Self::Pitching => "pitching",
        }
    }
}

/// Aggregation granularity.
///
/// Only `Career` aggregates across seasons; every other split produces rows
/// that belong to exactly one season and can be cached per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    Career,
    Year,
    Month,
    Game,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Career => "career",
            Self::Year => "year",
            Self::Month => "month",
            Self::Game => "game",
        }
    }

    pub fn is_career(&self) -> bool {
        matches!(self, Self::Career)
    }
}

/// Whether rows are grouped per player or per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FindMode {
    #[default]
    Player,
    Team,
}

impl FindMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Team => "team",
        }
    }
}

/// Batter or pitcher handedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    L,
    R,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L => "L",
            Self::R => "R",
        }
    }
}

/// A single filter value.
///
/// The derived ordering (booleans, then integers, then strings) is the
/// canonical order used when sorting lists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    fn from_json(field: &str, value: &Value) -> Result<Self, EncodingError> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Int).ok_or_else(|| {
                EncodingError::UnsupportedType {
                    field: field.to_string(),
                    found: format!("non-integer number {}", n),
                }
            }),
            Value::Array(_) => Err(EncodingError::NestedList {
                field: field.to_string(),
            }),
            other => Err(EncodingError::UnsupportedType {
                field: field.to_string(),
                found: json_type_name(other).to_string(),
            }),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A filter is either one scalar or a flat list of scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl FilterValue {
    /// Build a list filter in canonical order.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let mut items: Vec<Scalar> = items.into_iter().map(Into::into).collect();
        items.sort();
        Self::List(items)
    }

    /// Convert a JSON request value, rejecting anything that is not a string,
    /// integer, boolean or flat list of those.
    pub fn from_json(field: &str, value: &Value) -> Result<Self, EncodingError> {
        match value {
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| Scalar::from_json(field, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::list(items))
            }
            other => Scalar::from_json(field, other).map(Self::Scalar),
        }
    }

    /// Return this value with any list in canonical order.
    pub fn normalized(&self) -> Self {
        match self {
            Self::Scalar(s) => Self::Scalar(s.clone()),
            Self::List(items) => Self::list(items.iter().cloned()),
        }
    }
}

impl From<Scalar> for FilterValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Scalar(value.into())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Normalized parameters of one statistics query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQueryDescriptor")]
pub struct QueryDescriptor {
    stat_type: StatType,
    split: SplitMode,
    find: FindMode,
    years: YearRange,
    filters: BTreeMap<String, FilterValue>,
}

/// Wire shape of a descriptor before its filters are checked.
#[derive(Deserialize)]
struct RawQueryDescriptor {
    stat_type: StatType,
    split: SplitMode,
    find: FindMode,
    years: YearRange,
    #[serde(default)]
    filters: BTreeMap<String, FilterValue>,
}

impl TryFrom<RawQueryDescriptor> for QueryDescriptor {
    type Error = EncodingError;

    fn try_from(raw: RawQueryDescriptor) -> Result<Self, Self::Error> {
        let mut descriptor = Self::new(raw.stat_type, raw.years)
            .with_split(raw.split)
            .with_find(raw.find);
        for (name, value) in raw.filters {
            descriptor = descriptor.with_filter(name, value)?;
        }
        Ok(descriptor)
    }
}

impl QueryDescriptor {
    /// Per-year player query over `years` with no filters.
    pub fn new(stat_type: StatType, years: YearRange) -> Self {
        Self {
            stat_type,
            split: SplitMode::Year,
            find: FindMode::Player,
            years,
            filters: BTreeMap::new(),
        }
    }

    pub fn batting(years: YearRange) -> Self {
        Self::new(StatType::Batting, years)
    }

    pub fn pitching(years: YearRange) -> Self {
        Self::new(StatType::Pitching, years)
    }

    /// Build a descriptor from an already-parsed parameter object.
    ///
    /// `type` is required. `split` defaults to `year`, `find` to `player`, and
    /// missing `start_year`/`end_year` default to `default_year`. Every other
    /// key becomes a filter.
    pub fn from_params(
        params: &serde_json::Map<String, Value>,
        default_year: Year,
    ) -> Result<Self, EncodingError> {
        let stat_type = match params.get("type") {
            Some(value) => parse_enum::<StatType>("type", value)?,
            None => {
                return Err(EncodingError::InvalidValue {
                    field: "type".to_string(),
                    reason: "is required".to_string(),
                })
            }
        };
        let split = params
            .get("split")
            .map(|v| parse_enum::<SplitMode>("split", v))
            .transpose()?
            .unwrap_or(SplitMode::Year);
        let find = params
            .get("find")
            .map(|v| parse_enum::<FindMode>("find", v))
            .transpose()?
            .unwrap_or_default();
        let start = parse_year(params, "start_year")?.unwrap_or(default_year);
        let end = parse_year(params, "end_year")?.unwrap_or(default_year);

        let mut descriptor = Self::new(stat_type, YearRange::new(start, end)?)
            .with_split(split)
            .with_find(find);

        for (name, value) in params {
            if matches!(
                name.as_str(),
                "type" | "split" | "find" | "start_year" | "end_year"
            ) {
                continue;
            }
            descriptor = descriptor.with_filter(name, FilterValue::from_json(name, value)?)?;
        }
        Ok(descriptor)
    }

    pub fn with_split(mut self, split: SplitMode) -> Self {
        self.split = split;
        self
    }

    pub fn with_find(mut self, find: FindMode) -> Self {
        self.find = find;
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    /// Add or replace a filter. Lists are stored in canonical order.
    pub fn with_filter(
        mut self,
        name: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Result<Self, EncodingError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EncodingError::EmptyField);
        }
        if RESERVED_KEYS.contains(&name.as_str()) {
            return Err(EncodingError::ReservedField { field: name });
        }
        let value = value.into().normalized();
        self.filters.insert(name, value);
        Ok(self)
    }

    // Known filters. Names are fixed, so these cannot hit a reserved key.

    fn set(mut self, name: &str, value: FilterValue) -> Self {
        self.filters.insert(name.to_string(), value);
        self
    }

    pub fn with_batter_handedness(self, hand: Handedness) -> Self {
        self.set(filter_names::BATTER_HANDEDNESS_PA, hand.as_str().into())
    }

    pub fn with_pitcher_handedness(self, hand: Handedness) -> Self {
        self.set(filter_names::PITCHER_HANDEDNESS, hand.as_str().into())
    }

    pub fn with_batter_starter(self, starter: bool) -> Self {
        self.set(filter_names::BATTER_STARTER, yes_no(starter))
    }

    pub fn with_pitcher_starter(self, starter: bool) -> Self {
        self.set(filter_names::PITCHER_STARTER, yes_no(starter))
    }

    pub fn with_batter_home(self, home: bool) -> Self {
        self.set(filter_names::BATTER_HOME, yes_no(home))
    }

    pub fn with_pitcher_home(self, home: bool) -> Self {
        self.set(filter_names::PITCHER_HOME, yes_no(home))
    }

    pub fn with_batter_lineup_pos(self, pos: i64) -> Self {
        self.set(filter_names::BATTER_LINEUP_POS, pos.into())
    }

    pub fn with_player_field_position(self, pos: i64) -> Self {
        self.set(filter_names::PLAYER_FIELD_POSITION, pos.into())
    }

    pub fn with_days_of_week<I, S>(self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            filter_names::DAYS_OF_WEEK,
            FilterValue::list(days.into_iter().map(|d| Scalar::Str(d.into()))),
        )
    }

    pub fn with_pitching_teams<I, S>(self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            filter_names::PITCHING_TEAM,
            FilterValue::list(teams.into_iter().map(|t| Scalar::Str(t.into()))),
        )
    }

    pub fn with_batting_teams<I, S>(self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(
            filter_names::BATTING_TEAM,
            FilterValue::list(teams.into_iter().map(|t| Scalar::Str(t.into()))),
        )
    }

    pub fn with_innings(self, innings: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::INNINGS, FilterValue::list(innings))
    }

    pub fn with_outs(self, outs: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::OUTS, FilterValue::list(outs))
    }

    pub fn with_strikes(self, strikes: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::STRIKES, FilterValue::list(strikes))
    }

    pub fn with_balls(self, balls: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::BALLS, FilterValue::list(balls))
    }

    pub fn with_score_diff(self, diffs: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::SCORE_DIFF, FilterValue::list(diffs))
    }

    pub fn with_home_score(self, scores: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::HOME_SCORE, FilterValue::list(scores))
    }

    pub fn with_away_score(self, scores: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::AWAY_SCORE, FilterValue::list(scores))
    }

    pub fn with_base_situation(self, situations: impl IntoIterator<Item = i64>) -> Self {
        self.set(filter_names::BASE_SITUATION, FilterValue::list(situations))
    }

    pub fn stat_type(&self) -> StatType {
        self.stat_type
    }

    pub fn split(&self) -> SplitMode {
        self.split
    }

    pub fn find(&self) -> FindMode {
        self.find
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    pub fn filters(&self) -> &BTreeMap<String, FilterValue> {
        &self.filters
    }

    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {} ({} filters)",
            self.stat_type.as_str(),
            self.split.as_str(),
            self.find.as_str(),
            self.years,
            self.filters.len()
        )
    }
}

fn yes_no(flag: bool) -> FilterValue {
    let flag = if flag { "Y" } else { "N" };
    FilterValue::from(flag)
}

fn parse_enum<T: serde::de::DeserializeOwned>(
    field: &str,
    value: &Value,
) -> Result<T, EncodingError> {
    serde_json::from_value(value.clone()).map_err(|_| EncodingError::InvalidValue {
        field: field.to_string(),
        reason: format!("unrecognized value {}", value),
    })
}

fn parse_year(
    params: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<Option<Year>, EncodingError> {
    match params.get(field) {
        None => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => Year::try_from_i64(field, v).map(Some),
            None => Err(EncodingError::UnsupportedType {
                field: field.to_string(),
                found: format!("non-integer number {}", n),
            }),
        },
        Some(other) => Err(EncodingError::UnsupportedType {
            field: field.to_string(),
            found: json_type_name(other).to_string(),
        }),
    }
}
