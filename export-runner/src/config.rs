use clap::Parser;
use export_config::load_config;
use export_config::shared::{ExportConfig, ProcessingMode};
use std::path::PathBuf;

use crate::error::{RunnerError, RunnerResult};

/// Exports every entity of the source into a per-entity JSON tree.
///
/// Flags override the values loaded from the configuration files.
#[derive(Debug, Parser)]
#[command(name = "export-runner")]
pub struct CliOverrides {
    /// Entity that is always fully processed when Active, even if skip-listed
    #[arg(long)]
    pub target: Option<u64>,

    /// Which entities get the full export: `demo` (Simple Shops) or `full` (every Active entity)
    #[arg(long)]
    pub mode: Option<ProcessingMode>,

    /// Root directory of the export tree
    #[arg(long)]
    pub output: Option<PathBuf>,
}

impl CliOverrides {
    fn apply(self, config: &mut ExportConfig) {
        if let Some(target) = self.target {
            config.target_entity_id = Some(target);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(output) = self.output {
            config.output.root_dir = output;
        }
    }
}

/// Loads the export configuration, applies `overrides` and validates the result.
pub fn load_export_config(overrides: CliOverrides) -> RunnerResult<ExportConfig> {
    let mut config = load_config::<ExportConfig>().map_err(RunnerError::config)?;
    overrides.apply(&mut config);
    config.validate().map_err(RunnerError::config)?;

    Ok(config)
}
