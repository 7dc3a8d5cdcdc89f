use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Bulk preload settings.
///
/// When the set of entities selected for full processing is larger than `max_entities`, the
/// preload is skipped and every entity falls back to lazy per-entity loads. This bounds both
/// the IN-list size of a single query and the rows resident in memory at once.
///
/// The Simple Shop preload ahead of the basic pass is never skipped. It splits the shops into
/// IN-lists of at most `chunk_size` entities instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreloadConfig {
    #[serde(default = "default_preload_max_entities")]
    pub max_entities: usize,
    #[serde(default = "default_preload_chunk_size")]
    pub chunk_size: usize,
}

impl PreloadConfig {
    /// Default maximum number of entities covered by one bulk preload.
    pub const DEFAULT_MAX_ENTITIES: usize = 100;

    /// Default number of entities in one chunked preload query.
    pub const DEFAULT_CHUNK_SIZE: usize = 500;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_entities == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "preload.max_entities".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "preload.chunk_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            max_entities: default_preload_max_entities(),
            chunk_size: default_preload_chunk_size(),
        }
    }
}

fn default_preload_max_entities() -> usize {
    PreloadConfig::DEFAULT_MAX_ENTITIES
}

fn default_preload_chunk_size() -> usize {
    PreloadConfig::DEFAULT_CHUNK_SIZE
}

/// Settings for the lazy full-table scans of `Entity` and `Address`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanConfig {
    /// Number of rows fetched per page.
    #[serde(default = "default_scan_batch_size")]
    pub batch_size: usize,
}

impl ScanConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "scan.batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            batch_size: default_scan_batch_size(),
        }
    }
}

fn default_scan_batch_size() -> usize {
    ScanConfig::DEFAULT_BATCH_SIZE
}

/// Memory governor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Number of phase 2 entities after which every cache is emptied.
    #[serde(default = "default_global_eviction_interval")]
    pub global_eviction_interval: usize,
}

impl MemoryConfig {
    pub const DEFAULT_GLOBAL_EVICTION_INTERVAL: usize = 50;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.global_eviction_interval == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "memory.global_eviction_interval".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            global_eviction_interval: default_global_eviction_interval(),
        }
    }
}

fn default_global_eviction_interval() -> usize {
    MemoryConfig::DEFAULT_GLOBAL_EVICTION_INTERVAL
}
