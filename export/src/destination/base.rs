use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;

use crate::category::CategoryPayload;
use crate::error::ExportResult;
use crate::projection::EntityProjection;
use crate::statistics::BasicStatistics;
use crate::types::EntityId;

/// Name of the global index file at the output root.
pub const INDEX_FILE: &str = "index.json";

/// Name of the flat projection file inside an entity directory.
pub const ENTITY_FILE: &str = "entity.json";

/// Name of the basic statistics file inside an entity directory.
pub const STATISTICS_FILE: &str = "statistics.json";

/// Trait for stores that persist exported entities.
///
/// Every entity owns one directory holding a file per category, the flat projection and its
/// basic statistics. A global index lists every exported entity together with a
/// `fullyProcessed` flag, which is the marker used to resume interrupted runs.
///
/// Writes for one entity replace whatever an earlier run left behind. Implementations must not
/// clear a `fullyProcessed` flag once it has been set.
pub trait OutputWriter {
    /// Returns the directory holding the files of an entity.
    fn entity_path(&self, entity_id: EntityId) -> PathBuf;

    /// Creates the directory of an entity if it does not exist yet.
    fn create_directory(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    /// Writes one file per category payload.
    fn write_category_files(
        &self,
        entity_id: EntityId,
        categories: &[CategoryPayload],
    ) -> impl Future<Output = ExportResult<()>> + Send;

    /// Replaces the flat projection of an entity.
    fn update_entity_projection(
        &self,
        entity_id: EntityId,
        projection: &EntityProjection,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    /// Persists the basic statistics gathered during the basic pass.
    fn record_basic_statistics(
        &self,
        entity_id: EntityId,
        statistics: &BasicStatistics,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    /// Returns every entity whose index entry is marked fully processed.
    ///
    /// An absent index yields an empty set.
    fn list_fully_processed(&self) -> impl Future<Output = ExportResult<HashSet<EntityId>>> + Send;

    /// Refreshes the index entry of one entity from its persisted projection.
    ///
    /// When `mark_complete` is set, the entry is flagged as fully processed.
    fn regenerate_index(
        &self,
        entity_id: EntityId,
        mark_complete: bool,
    ) -> impl Future<Output = ExportResult<()>> + Send;

    /// Rebuilds the whole index from every persisted projection, keeping existing flags.
    fn finalize_index(&self) -> impl Future<Output = ExportResult<()>> + Send;

    /// Returns whether a file exists, relative to the output root.
    fn file_exists(&self, path: &str) -> impl Future<Output = bool> + Send;
}
