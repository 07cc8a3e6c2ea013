//! Statistics engine interface.
//!
//! The engine that rescans play-by-play data is an external collaborator.
//! The cache only needs it to answer a descriptor for a set of seasons, with
//! every row carrying its own `year` (or the career sentinel).

use std::fmt;
use std::sync::Arc;

use crate::{ComputationError, QueryDescriptor, StatRow, Year, YearRange};

/// Which seasons the engine is asked to compute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineScope {
    /// Specific seasons of a per-year split, not necessarily contiguous.
    Years(Vec<Year>),
    /// A whole career range, aggregated into one set of rows.
    Range(YearRange),
}

impl EngineScope {
    pub fn years(&self) -> Vec<Year> {
        match self {
            Self::Years(years) => years.clone(),
            Self::Range(range) => range.years().collect(),
        }
    }
}

impl fmt::Display for EngineScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Years(years) => {
                let list: Vec<String> = years.iter().map(Year::to_string).collect();
                write!(f, "[{}]", list.join(","))
            }
            Self::Range(range) => write!(f, "{}", range),
        }
    }
}

/// Computes statistic rows for a descriptor.
///
/// Implementations are expected to be deterministic functions of the source
/// data: two computations of the same season yield the same rows.
pub trait StatsEngine: Send + Sync {
    fn compute(
        &self,
        descriptor: &QueryDescriptor,
        scope: &EngineScope,
    ) -> Result<Vec<StatRow>, ComputationError>;
}

impl<E: StatsEngine + ?Sized> StatsEngine for Arc<E> {
    fn compute(
        &self,
        descriptor: &QueryDescriptor,
        scope: &EngineScope,
    ) -> Result<Vec<StatRow>, ComputationError> {
        (**self).compute(descriptor, scope)
    }
}

impl<E: StatsEngine + ?Sized> StatsEngine for &E {
    fn compute(
        &self,
        descriptor: &QueryDescriptor,
        scope: &EngineScope,
    ) -> Result<Vec<StatRow>, ComputationError> {
        (**self).compute(descriptor, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantEngine;

    impl StatsEngine for ConstantEngine {
        fn compute(
            &self,
            _descriptor: &QueryDescriptor,
            scope: &EngineScope,
        ) -> Result<Vec<StatRow>, ComputationError> {
            Ok(scope
                .years()
                .into_iter()
                .map(|y| StatRow::new().with("year", i64::from(y.get())))
                .collect())
        }
    }

    #[test]
    fn test_engine_scope_years() {
        let range = YearRange::new(Year::new(2019), Year::new(2021)).unwrap();
        assert_eq!(EngineScope::Range(range).years().len(), 3);
        assert_eq!(
            EngineScope::Years(vec![Year::new(2020), Year::new(2022)]).to_string(),
            "[2020,2022]"
        );
    }

    #[test]
    fn test_arc_engine_delegates() {
        let engine: Arc<dyn StatsEngine> = Arc::new(ConstantEngine);
        let range = YearRange::single(Year::new(2020));
        let rows = engine
            .compute(
                &QueryDescriptor::batting(range),
                &EngineScope::Years(vec![Year::new(2020)]),
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year(), Some(Year::new(2020)));
    }
}
