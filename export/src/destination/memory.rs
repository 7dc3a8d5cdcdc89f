use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::category::{Category, CategoryPayload};
use crate::destination::base::{ENTITY_FILE, INDEX_FILE, OutputWriter, STATISTICS_FILE};
use crate::destination::index::{IndexDocument, IndexEntry};
use crate::error::{ErrorKind, ExportResult};
use crate::projection::{EntityProjection, ProcessingLevel};
use crate::statistics::BasicStatistics;
use crate::types::EntityId;

#[derive(Debug, Default)]
struct Inner {
    directories: HashSet<EntityId>,
    categories: HashMap<EntityId, Vec<CategoryPayload>>,
    projections: HashMap<EntityId, EntityProjection>,
    statistics: HashMap<EntityId, BasicStatistics>,
    index: Option<BTreeMap<EntityId, IndexEntry>>,
    projection_writes: Vec<(EntityId, ProcessingLevel)>,
    index_regenerations: Vec<(EntityId, bool)>,
    finalize_calls: usize,
    failing_entities: HashSet<EntityId>,
    fail_finalize: bool,
}

impl Inner {
    fn check_entity(&self, entity_id: EntityId) -> ExportResult<()> {
        if self.failing_entities.contains(&entity_id) {
            bail!(
                ErrorKind::DestinationIoError,
                "Injected output failure",
                format!("entity {entity_id}")
            );
        }

        Ok(())
    }
}

/// In-memory output writer for testing and development purposes.
///
/// Keeps the latest payloads per entity together with a log of projection writes and index
/// refreshes, so tests can check both the final state and how it was reached.
#[derive(Debug, Clone)]
pub struct MemoryOutputWriter {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryOutputWriter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Makes every write for `entity_id` fail.
    pub async fn fail_entity(&self, entity_id: EntityId) {
        let mut inner = self.inner.lock().await;
        inner.failing_entities.insert(entity_id);
    }

    /// Makes [`OutputWriter::finalize_index`] fail.
    pub async fn fail_finalize(&self) {
        let mut inner = self.inner.lock().await;
        inner.fail_finalize = true;
    }

    pub async fn categories(&self, entity_id: EntityId) -> Option<Vec<CategoryPayload>> {
        let inner = self.inner.lock().await;
        inner.categories.get(&entity_id).cloned()
    }

    pub async fn category(
        &self,
        entity_id: EntityId,
        category: Category,
    ) -> Option<CategoryPayload> {
        let inner = self.inner.lock().await;
        inner
            .categories
            .get(&entity_id)?
            .iter()
            .find(|payload| payload.category() == category)
            .cloned()
    }

    pub async fn projection(&self, entity_id: EntityId) -> Option<EntityProjection> {
        let inner = self.inner.lock().await;
        inner.projections.get(&entity_id).cloned()
    }

    pub async fn statistics(&self, entity_id: EntityId) -> Option<BasicStatistics> {
        let inner = self.inner.lock().await;
        inner.statistics.get(&entity_id).copied()
    }

    /// Returns the current index, or [`None`] if it was never written.
    pub async fn index(&self) -> Option<IndexDocument> {
        let inner = self.inner.lock().await;
        inner.index.clone().map(IndexDocument::new)
    }

    /// Every projection write in order, with the level written.
    pub async fn projection_writes(&self) -> Vec<(EntityId, ProcessingLevel)> {
        let inner = self.inner.lock().await;
        inner.projection_writes.clone()
    }

    /// Every entity-level index refresh in order, with its completion flag.
    pub async fn index_regenerations(&self) -> Vec<(EntityId, bool)> {
        let inner = self.inner.lock().await;
        inner.index_regenerations.clone()
    }

    pub async fn finalize_calls(&self) -> usize {
        self.inner.lock().await.finalize_calls
    }

    /// Clears the write logs, keeping persisted state.
    pub async fn clear_logs(&self) {
        let mut inner = self.inner.lock().await;
        inner.projection_writes.clear();
        inner.index_regenerations.clear();
        inner.finalize_calls = 0;
    }
}

impl Default for MemoryOutputWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputWriter for MemoryOutputWriter {
    fn entity_path(&self, entity_id: EntityId) -> PathBuf {
        PathBuf::from(entity_id.to_string())
    }

    async fn create_directory(&self, entity_id: EntityId) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_entity(entity_id)?;
        inner.directories.insert(entity_id);

        Ok(())
    }

    async fn write_category_files(
        &self,
        entity_id: EntityId,
        categories: &[CategoryPayload],
    ) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_entity(entity_id)?;
        inner.categories.insert(entity_id, categories.to_vec());

        Ok(())
    }

    async fn update_entity_projection(
        &self,
        entity_id: EntityId,
        projection: &EntityProjection,
    ) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_entity(entity_id)?;

        debug!(%entity_id, level = ?projection.processing_level, "projection stored");

        inner
            .projection_writes
            .push((entity_id, projection.processing_level));
        inner.projections.insert(entity_id, projection.clone());

        Ok(())
    }

    async fn record_basic_statistics(
        &self,
        entity_id: EntityId,
        statistics: &BasicStatistics,
    ) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_entity(entity_id)?;
        inner.statistics.insert(entity_id, *statistics);

        Ok(())
    }

    async fn list_fully_processed(&self) -> ExportResult<HashSet<EntityId>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .index
            .iter()
            .flat_map(|index| index.values())
            .filter(|entry| entry.fully_processed)
            .map(|entry| entry.entity_id)
            .collect())
    }

    async fn regenerate_index(&self, entity_id: EntityId, mark_complete: bool) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_entity(entity_id)?;

        let Some(projection) = inner.projections.get(&entity_id) else {
            bail!(
                ErrorKind::InvalidState,
                "No projection stored for entity",
                format!("entity {entity_id}")
            );
        };
        let mut entry = IndexEntry::from_projection(projection, mark_complete);

        let index = inner.index.get_or_insert_with(BTreeMap::new);
        if index
            .get(&entity_id)
            .is_some_and(|existing| existing.fully_processed)
        {
            entry.fully_processed = true;
        }
        index.insert(entity_id, entry);
        inner.index_regenerations.push((entity_id, mark_complete));

        Ok(())
    }

    async fn finalize_index(&self) -> ExportResult<()> {
        let mut inner = self.inner.lock().await;
        inner.finalize_calls += 1;

        if inner.fail_finalize {
            bail!(ErrorKind::DestinationIoError, "Injected index failure");
        }

        let previous = inner.index.take().unwrap_or_default();
        let entries = inner
            .projections
            .iter()
            .map(|(entity_id, projection)| {
                let fully_processed = previous
                    .get(entity_id)
                    .is_some_and(|existing| existing.fully_processed);
                (*entity_id, IndexEntry::from_projection(projection, fully_processed))
            })
            .collect();
        inner.index = Some(entries);

        Ok(())
    }

    async fn file_exists(&self, path: &str) -> bool {
        let inner = self.inner.lock().await;

        if path == INDEX_FILE {
            return inner.index.is_some();
        }

        let (directory, file) = path.split_once('/').unwrap_or((path, ""));
        let Ok(entity_id) = directory.parse::<EntityId>() else {
            return false;
        };

        match file {
            "" => inner.directories.contains(&entity_id),
            ENTITY_FILE => inner.projections.contains_key(&entity_id),
            STATISTICS_FILE => inner.statistics.contains_key(&entity_id),
            other => inner.categories.get(&entity_id).is_some_and(|payloads| {
                payloads
                    .iter()
                    .any(|payload| format!("{}.json", payload.category().file_stem()) == other)
            }),
        }
    }
}
