//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "statcache")]
#[command(about = "Inspect and maintain the statcache LMDB cache", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML settings file (falls back to STATCACHE_CONFIG, then defaults)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drop every cached entry covering the given seasons
    Invalidate {
        /// Season to invalidate; repeat for several
        #[arg(long = "year", value_name = "YEAR", required_unless_present = "current")]
        years: Vec<u16>,

        /// Invalidate the current season (run after a data refresh)
        #[arg(long, conflicts_with = "years")]
        current: bool,
    },

    /// Print store statistics
    Stats,

    /// Show the fingerprints a parameter object maps to and which are cached
    Fingerprint {
        /// Parameter object as JSON, or @path to a JSON file
        #[arg(long, value_name = "JSON")]
        params: String,

        /// Season used when the parameters omit start_year/end_year
        #[arg(long, value_name = "YEAR")]
        default_year: Option<u16>,
    },

    /// Show the year tags and row count of one entry
    Inspect {
        /// Hex-encoded fingerprint
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
    },
}
