use export::destination::filesystem::FileSystemOutputWriter;
use export::downstream::{DirectoryMirrorSync, NoopDownstream, NoopRemoteSync, RemoteSync};
use export::pipeline::{ExportPipeline, RunSummary};
use export::source::mysql::MySqlSource;
use export_config::shared::{ExportConfig, SourceConnectionConfigWithoutSecrets};
use tracing::info;

use crate::error::RunnerResult;

/// Connects to the source and runs one export with the provided configuration.
///
/// Entity directories are mirrored only when `remote_sync` is configured.
pub async fn run_export(export_config: ExportConfig) -> RunnerResult<RunSummary> {
    info!("starting export");

    log_config(&export_config);

    let source = MySqlSource::connect(&export_config.source).await?;
    let writer = FileSystemOutputWriter::new(&export_config.output.root_dir);

    // Each sync flavor is a separate pipeline type, since dispatch is static.
    let remote_sync = export_config
        .remote_sync
        .as_ref()
        .map(DirectoryMirrorSync::from_config);
    let result = match remote_sync {
        Some(remote_sync) => {
            run_pipeline(export_config, source.clone(), writer, remote_sync).await
        }
        None => run_pipeline(export_config, source.clone(), writer, NoopRemoteSync).await,
    };

    source.close().await;

    result
}

async fn run_pipeline<R>(
    export_config: ExportConfig,
    source: MySqlSource,
    writer: FileSystemOutputWriter,
    remote_sync: R,
) -> RunnerResult<RunSummary>
where
    R: RemoteSync + Sync,
{
    let pipeline = ExportPipeline::new(export_config, source, writer, NoopDownstream, remote_sync);
    let summary = pipeline.run().await?;

    info!(
        processed = summary.phase1.processed + summary.phase2.processed,
        errored = summary.phase1.errored + summary.phase2.errored,
        "export finished"
    );

    Ok(summary)
}

fn log_config(config: &ExportConfig) {
    let source = SourceConnectionConfigWithoutSecrets::from(config.source.clone());

    info!(
        host = %source.host,
        port = source.port,
        database = %source.name,
        username = %source.username,
        max_connections = source.max_connections,
        "source connection config"
    );
    info!(
        root_dir = %config.output.root_dir.display(),
        mode = %config.mode,
        target = ?config.target_entity_id,
        skip_list = config.skip_list.len(),
        preload_max_entities = config.preload.max_entities,
        scan_batch_size = config.scan.batch_size,
        global_eviction_interval = config.memory.global_eviction_interval,
        remote_sync = config.remote_sync.is_some(),
        "export config"
    );
}
