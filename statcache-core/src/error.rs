//! Error types for statcache operations

use crate::Year;
use thiserror::Error;

/// Descriptor encoding errors.
///
/// Raised while building or canonicalizing a descriptor. The caller must fix
/// the descriptor; these are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Unsupported value type for {field}: {found}")]
    UnsupportedType { field: String, found: String },

    #[error("Nested list in {field}: only flat lists of scalars are allowed")]
    NestedList { field: String },

    #[error("Filter name {field:?} is reserved")]
    ReservedField { field: String },

    #[error("Filter name must not be empty")]
    EmptyField,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Scope mismatch: {reason}")]
    ScopeMismatch { reason: String },

    #[error("Canonical serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt entry {fingerprint}: {reason}")]
    Corrupt { fingerprint: String, reason: String },

    #[error("Entry {fingerprint} has no year tags")]
    MissingYearTags { fingerprint: String },

    #[error("Row-set for {fingerprint} is not serializable: {reason}")]
    Unserializable { fingerprint: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Statistics engine failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComputationError {
    #[error("Computation failed for years {years:?}: {reason}")]
    Failed { years: Vec<Year>, reason: String },

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all statcache errors.
#[derive(Debug, Error)]
pub enum StatCacheError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Computation error: {0}")]
    Computation(#[from] ComputationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl StatCacheError {
    /// True when the error came from the storage medium rather than the query.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }
}

/// Result type alias for statcache operations.
pub type StatCacheResult<T> = Result<T, StatCacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_display_unsupported_type() {
        let err = EncodingError::UnsupportedType {
            field: "innings".to_string(),
            found: "float".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unsupported value type"));
        assert!(msg.contains("innings"));
        assert!(msg.contains("float"));
    }

    #[test]
    fn test_store_error_display_unavailable() {
        let err = StoreError::Unavailable {
            reason: "map full".to_string(),
        };
        assert!(format!("{}", err).contains("map full"));
    }

    #[test]
    fn test_computation_error_display_lists_years() {
        let err = ComputationError::Failed {
            years: vec![Year::new(2020), Year::new(2022)],
            reason: "engine crashed".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("2020"));
        assert!(msg.contains("2022"));
        assert!(msg.contains("engine crashed"));
    }

    #[test]
    fn test_statcache_error_from_variants() {
        let encoding = StatCacheError::from(EncodingError::EmptyField);
        assert!(matches!(encoding, StatCacheError::Encoding(_)));

        let store = StatCacheError::from(StoreError::LockPoisoned);
        assert!(matches!(store, StatCacheError::Store(_)));
        assert!(!store.is_store_unavailable());

        let unavailable = StatCacheError::from(StoreError::Unavailable {
            reason: "gone".to_string(),
        });
        assert!(unavailable.is_store_unavailable());

        let computation = StatCacheError::from(ComputationError::TaskFailed {
            reason: "panicked".to_string(),
        });
        assert!(matches!(computation, StatCacheError::Computation(_)));

        let config = StatCacheError::from(ConfigError::InvalidValue {
            field: "map_size_mb",
            reason: "must be > 0".to_string(),
        });
        assert!(matches!(config, StatCacheError::Config(_)));
    }
}
