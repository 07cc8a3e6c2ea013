//! Cache configuration.
//!
//! Loaded from a TOML file named by `--config` or `STATCACHE_CONFIG`, then
//! overridden field by field from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{ConfigError, DEFAULT_CACHE_VERSION};

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "STATCACHE_CONFIG";
pub const PATH_ENV: &str = "STATCACHE_PATH";
pub const MAP_SIZE_ENV: &str = "STATCACHE_MAP_SIZE_MB";
pub const CACHE_VERSION_ENV: &str = "STATCACHE_CACHE_VERSION";

/// Settings for opening the cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Directory holding the LMDB environment.
    pub path: PathBuf,
    /// Maximum size of the memory map in megabytes.
    pub map_size_mb: usize,
    /// Mixed into every fingerprint. Bump after an engine or schema change.
    pub cache_version: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("lmdb_db"),
            map_size_mb: 1024 * 1024, // 1 TiB
            cache_version: DEFAULT_CACHE_VERSION,
        }
    }
}

impl CacheSettings {
    /// Resolve settings: explicit path, then `STATCACHE_CONFIG`, then
    /// defaults; env overrides are applied last.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut settings = match config_path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: CacheSettings = toml::from_str(contents)?;
        Ok(settings)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(PATH_ENV) {
            self.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(MAP_SIZE_ENV) {
            self.map_size_mb = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "map_size_mb",
                reason: format!("{:?} is not an integer", raw),
            })?;
        }
        if let Some(raw) = lookup(CACHE_VERSION_ENV) {
            self.cache_version = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: "cache_version",
                reason: format!("{:?} is not an integer", raw),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.map_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb",
                reason: "must be > 0".to_string(),
            });
        }
        if self.map_size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "map_size_mb",
                reason: "overflows the address space".to_string(),
            });
        }
        Ok(())
    }

    /// Map size in bytes.
    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}
