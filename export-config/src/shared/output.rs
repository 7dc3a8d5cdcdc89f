use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Where the per-entity JSON tree is written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root_dir: PathBuf,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyOutputRoot);
        }

        Ok(())
    }
}

/// Mirrors fully processed entity directories to a second location.
///
/// Each entity directory is copied to `{target_dir}/{key_prefix}/{entity_id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteSyncConfig {
    pub target_dir: PathBuf,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "entities".to_string()
}
