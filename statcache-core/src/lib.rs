//! statcache Core - Descriptors, Fingerprints and Year Planning
//!
//! Pure data types and pure functions. Nothing in this crate touches storage
//! or runs a statistics engine; `statcache-storage` builds on top of it.

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod plan;
pub mod row;
pub mod year;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::CacheSettings;
pub use descriptor::{
    filter_names, FilterValue, FindMode, Handedness, QueryDescriptor, Scalar, SplitMode,
    StatType, RESERVED_KEYS,
};
pub use engine::{EngineScope, StatsEngine};
pub use error::{
    ComputationError, ConfigError, EncodingError, StatCacheError, StatCacheResult, StoreError,
};
pub use fingerprint::{
    Fingerprint, KeyEncoder, LookupScope, DEFAULT_CACHE_VERSION, FINGERPRINT_LEN,
};
pub use plan::{recompose, LookupEntry, LookupPlan, StoreItem, StorePlan, YearPlanner};
pub use row::{
    sanitize_rows, StatRow, StatValue, IDENTITY_COLUMNS, NAN_PLACEHOLDER, NA_PLACEHOLDER,
};
pub use year::{Year, YearRange};
