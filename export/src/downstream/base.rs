use export_config::shared::ProcessingMode;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::Path;

use crate::error::ExportResult;
use crate::types::{EntityId, Row};

/// Context handed to the customer and service-order processors.
#[derive(Debug, Clone, Copy)]
pub struct DownstreamScope<'a> {
    /// Root rows of the entities to process, keyed by id.
    pub entities: &'a BTreeMap<EntityId, Row>,
    pub mode: ProcessingMode,
    pub target: Option<EntityId>,
    pub simple_shops: &'a BTreeSet<EntityId>,
}

/// Processors that run after an entity's categories have been written.
///
/// Failures returned from these methods are logged by the pipeline and never undo what was
/// already persisted for the entity.
pub trait Downstream {
    fn process_customers(
        &self,
        scope: DownstreamScope<'_>,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    fn process_service_orders(
        &self,
        scope: DownstreamScope<'_>,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    fn aggregate_invoices(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    fn aggregate_repair_orders(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = ExportResult<()>> + Send;
}

/// Uploads a finished entity directory to remote storage.
pub trait RemoteSync {
    /// Returns whether syncing is configured.
    fn enabled(&self) -> bool;

    /// Copies `local_dir` under `remote_key`.
    ///
    /// `label` only identifies the upload in logs.
    fn sync_directory(
        &self,
        local_dir: &Path,
        remote_key: &str,
        label: &str,
    ) -> impl Future<Output = ExportResult<()>> + Send;
}

/// Downstream that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDownstream;

impl Downstream for NoopDownstream {
    async fn process_customers(&self, _scope: DownstreamScope<'_>) -> ExportResult<()> {
        Ok(())
    }

    async fn process_service_orders(&self, _scope: DownstreamScope<'_>) -> ExportResult<()> {
        Ok(())
    }

    async fn aggregate_invoices(&self, _entity_id: EntityId) -> ExportResult<()> {
        Ok(())
    }

    async fn aggregate_repair_orders(&self, _entity_id: EntityId) -> ExportResult<()> {
        Ok(())
    }
}

/// Remote sync that is always disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRemoteSync;

impl RemoteSync for NoopRemoteSync {
    fn enabled(&self) -> bool {
        false
    }

    async fn sync_directory(
        &self,
        _local_dir: &Path,
        _remote_key: &str,
        _label: &str,
    ) -> ExportResult<()> {
        Ok(())
    }
}
