//! Entity export binary.
//!
//! Loads the export configuration, applies command line overrides, initializes tracing and
//! runs one export against the configured MySQL source.

use clap::Parser;
use export_config::shared::ExportConfig;
use export_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::{CliOverrides, load_export_config};
use crate::core::run_export;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

fn main() {
    if let Err(err) = run() {
        eprint!("{}", err.render_report());
        std::process::exit(1);
    }
}

fn run() -> RunnerResult<()> {
    let overrides = CliOverrides::parse();
    let export_config = load_export_config(overrides)?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(RunnerError::config)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(export_config))?;

    Ok(())
}

async fn async_main(export_config: ExportConfig) -> RunnerResult<()> {
    if let Err(err) = run_export(export_config).await {
        error!("{err}");
        return Err(err);
    }

    Ok(())
}
