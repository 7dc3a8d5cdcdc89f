use serde::Deserialize;
use std::collections::HashSet;

use crate::Config;
use crate::shared::{
    MemoryConfig, OutputConfig, PreloadConfig, ProcessingMode, RemoteSyncConfig, ScanConfig,
    SimpleShopConfig, SkipEntry, SourceConnectionConfig, ValidationError,
};

/// Configuration for one export run.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking the source
/// password into serialized forms.
#[derive(Clone, Debug, Deserialize)]
pub struct ExportConfig {
    /// Connection to the MySQL source.
    pub source: SourceConnectionConfig,
    /// Output tree location.
    pub output: OutputConfig,
    /// Which entities get the full export when no target is given.
    #[serde(default)]
    pub mode: ProcessingMode,
    /// An entity that is always fully processed when Active, regardless of the skip-list.
    #[serde(default)]
    pub target_entity_id: Option<u64>,
    /// Entities excluded from automatic full processing.
    #[serde(default)]
    pub skip_list: Vec<SkipEntry>,
    #[serde(default)]
    pub preload: PreloadConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub simple_shop: SimpleShopConfig,
    /// Optional mirror of fully processed entity directories.
    #[serde(default)]
    pub remote_sync: Option<RemoteSyncConfig>,
}

impl ExportConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.output.validate()?;
        self.preload.validate()?;
        self.scan.validate()?;
        self.memory.validate()?;
        self.simple_shop.validate()?;

        let mut seen = HashSet::new();
        for entry in &self.skip_list {
            if !seen.insert(entry.entity_id) {
                return Err(ValidationError::DuplicateSkipEntry(entry.entity_id));
            }
        }

        Ok(())
    }
}

impl Config for ExportConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["simple_shop.excluded_statuses"];
}
