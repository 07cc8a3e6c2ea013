//! statcache CLI entry point.

use clap::Parser;
use statcache_cli::cli::Cli;
use statcache_cli::commands;
use statcache_cli::error::CliError;
use statcache_cli::telemetry;
use statcache_core::CacheSettings;

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json)?;

    let settings = CacheSettings::load(cli.config.as_deref())?;
    tracing::debug!(
        path = %settings.path.display(),
        cache_version = settings.cache_version,
        "Loaded settings"
    );

    let report = commands::execute(&cli.command, &settings)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
