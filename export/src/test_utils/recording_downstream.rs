use export_config::shared::ProcessingMode;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::downstream::{Downstream, DownstreamScope, RemoteSync};
use crate::error::{ErrorKind, ExportResult};
use crate::types::EntityId;

/// A call received by [`RecordingDownstream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamCall {
    Customers {
        entities: Vec<EntityId>,
        mode: ProcessingMode,
        target: Option<EntityId>,
    },
    ServiceOrders {
        entities: Vec<EntityId>,
        mode: ProcessingMode,
        target: Option<EntityId>,
    },
    Invoices(EntityId),
    RepairOrders(EntityId),
}

#[derive(Debug, Default)]
struct DownstreamInner {
    calls: Vec<DownstreamCall>,
    fail_customers: bool,
    failing_aggregations: HashSet<EntityId>,
}

/// Downstream that records every call and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingDownstream {
    inner: Arc<Mutex<DownstreamInner>>,
}

impl RecordingDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every customer processing call fail.
    pub async fn fail_customers(&self) {
        self.inner.lock().await.fail_customers = true;
    }

    /// Makes both aggregations of `entity_id` fail.
    pub async fn fail_aggregations(&self, entity_id: EntityId) {
        self.inner.lock().await.failing_aggregations.insert(entity_id);
    }

    pub async fn calls(&self) -> Vec<DownstreamCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Entities that reached invoice aggregation, in order.
    pub async fn aggregated_entities(&self) -> Vec<EntityId> {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                DownstreamCall::Invoices(entity_id) => Some(*entity_id),
                _ => None,
            })
            .collect()
    }
}

fn scope_entities(scope: &DownstreamScope<'_>) -> Vec<EntityId> {
    scope.entities.keys().copied().collect()
}

impl Downstream for RecordingDownstream {
    async fn process_customers(&self, scope: DownstreamScope<'_>) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(DownstreamCall::Customers {
            entities: scope_entities(&scope),
            mode: scope.mode,
            target: scope.target,
        });

        if inner.fail_customers {
            bail!(ErrorKind::DownstreamFailed, "Injected customer failure");
        }

        Ok(())
    }

    async fn process_service_orders(&self, scope: DownstreamScope<'_>) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(DownstreamCall::ServiceOrders {
            entities: scope_entities(&scope),
            mode: scope.mode,
            target: scope.target,
        });

        Ok(())
    }

    async fn aggregate_invoices(&self, entity_id: EntityId) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(DownstreamCall::Invoices(entity_id));

        if inner.failing_aggregations.contains(&entity_id) {
            bail!(
                ErrorKind::DownstreamFailed,
                "Injected invoice aggregation failure",
                format!("entity {entity_id}")
            );
        }

        Ok(())
    }

    async fn aggregate_repair_orders(&self, entity_id: EntityId) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(DownstreamCall::RepairOrders(entity_id));

        if inner.failing_aggregations.contains(&entity_id) {
            bail!(
                ErrorKind::DownstreamFailed,
                "Injected repair order aggregation failure",
                format!("entity {entity_id}")
            );
        }

        Ok(())
    }
}

/// Enabled remote sync that records the directories it was asked to upload.
#[derive(Debug, Clone, Default)]
pub struct RecordingRemoteSync {
    synced: Arc<Mutex<Vec<(PathBuf, String)>>>,
}

impl RecordingRemoteSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(local_dir, remote_key)` pair synced so far.
    pub async fn synced(&self) -> Vec<(PathBuf, String)> {
        self.synced.lock().await.clone()
    }
}

impl RemoteSync for RecordingRemoteSync {
    fn enabled(&self) -> bool {
        true
    }

    async fn sync_directory(
        &self,
        local_dir: &Path,
        remote_key: &str,
        _label: &str,
    ) -> ExportResult<()> {
        self.synced
            .lock()
            .await
            .push((local_dir.to_path_buf(), remote_key.to_string()));

        Ok(())
    }
}
