//! Command implementations.
//!
//! Each command returns a serializable report; `main` prints it as JSON.

use std::path::Path;
use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;
use statcache_core::{
    CacheSettings, Fingerprint, KeyEncoder, QueryDescriptor, Year, YearPlanner,
};
use statcache_storage::{CacheStats, CacheStore, Invalidator, LmdbCacheStore};
use tracing::info;

use crate::cli::Command;
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidateReport {
    pub years: Vec<Year>,
    pub removed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub entry_count: u64,
    pub year_tag_count: u64,
    pub hits: u64,
    pub misses: u64,
    pub bytes_written: u64,
}

impl From<CacheStats> for StatsReport {
    fn from(stats: CacheStats) -> Self {
        Self {
            entry_count: stats.entry_count,
            year_tag_count: stats.year_tag_count,
            hits: stats.hits,
            misses: stats.misses,
            bytes_written: stats.bytes_written,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintLine {
    pub scope: String,
    pub fingerprint: Fingerprint,
    /// Year tags currently stored for this fingerprint; empty on a miss.
    pub cached_years: Vec<Year>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintReport {
    pub descriptor: String,
    pub cache_version: u32,
    pub entries: Vec<FingerprintLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub fingerprint: Fingerprint,
    pub years: Vec<Year>,
    /// `None` when no entry is stored.
    pub rows: Option<usize>,
}

/// Open the store named by `settings` and run `command` against it.
pub fn execute(command: &Command, settings: &CacheSettings) -> Result<serde_json::Value, CliError> {
    let store = Arc::new(LmdbCacheStore::from_settings(settings)?);

    let report = match command {
        Command::Invalidate { years, current } => {
            let years = if *current {
                vec![current_year()?]
            } else {
                years.iter().copied().map(Year::new).collect()
            };
            serde_json::to_value(invalidate(store, years)?)?
        }
        Command::Stats => serde_json::to_value(stats(store.as_ref())?)?,
        Command::Fingerprint {
            params,
            default_year,
        } => {
            let raw = read_params(params)?;
            let default_year = match default_year {
                Some(year) => Year::new(*year),
                None => current_year()?,
            };
            let encoder = KeyEncoder::new(settings.cache_version);
            serde_json::to_value(fingerprint(store.as_ref(), encoder, &raw, default_year)?)?
        }
        Command::Inspect { fingerprint } => {
            serde_json::to_value(inspect(store.as_ref(), fingerprint)?)?
        }
    };
    Ok(report)
}

pub fn invalidate<S: CacheStore>(
    store: Arc<S>,
    years: Vec<Year>,
) -> Result<InvalidateReport, CliError> {
    let removed = Invalidator::new(store).invalidate_years(years.iter().copied())?;
    info!(years = ?years, removed, "Invalidation complete");
    Ok(InvalidateReport { years, removed })
}

pub fn stats<S: CacheStore>(store: &S) -> Result<StatsReport, CliError> {
    Ok(store.stats()?.into())
}

pub fn fingerprint<S: CacheStore>(
    store: &S,
    encoder: KeyEncoder,
    params_json: &str,
    default_year: Year,
) -> Result<FingerprintReport, CliError> {
    let params: serde_json::Map<String, serde_json::Value> = serde_json::from_str(params_json)?;
    let descriptor = QueryDescriptor::from_params(&params, default_year)?;
    let plan = YearPlanner::new(encoder).plan_lookup(&descriptor)?;

    let mut entries = Vec::with_capacity(plan.entries().len());
    for entry in plan.entries() {
        entries.push(FingerprintLine {
            scope: entry.scope.to_string(),
            fingerprint: entry.fingerprint,
            cached_years: store.get_years(&entry.fingerprint)?,
        });
    }

    Ok(FingerprintReport {
        descriptor: descriptor.to_string(),
        cache_version: encoder.cache_version(),
        entries,
    })
}

pub fn inspect<S: CacheStore>(store: &S, hex: &str) -> Result<InspectReport, CliError> {
    let fingerprint = Fingerprint::from_hex(hex)?;
    Ok(InspectReport {
        fingerprint,
        years: store.get_years(&fingerprint)?,
        rows: store.get(&fingerprint)?.map(|rows| rows.len()),
    })
}

/// `@path` reads the parameters from a file; anything else is literal JSON.
fn read_params(arg: &str) -> Result<String, CliError> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(Path::new(path))?),
        None => Ok(arg.to_string()),
    }
}

fn current_year() -> Result<Year, CliError> {
    let year = chrono::Utc::now().year();
    u16::try_from(year)
        .map(Year::new)
        .map_err(|_| CliError::InvalidArgument(format!("current year {} out of range", year)))
}
