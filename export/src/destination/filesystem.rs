use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::category::CategoryPayload;
use crate::destination::base::{ENTITY_FILE, INDEX_FILE, OutputWriter, STATISTICS_FILE};
use crate::destination::index::{IndexDocument, IndexEntry};
use crate::error::{ErrorKind, ExportResult};
use crate::export_error;
use crate::projection::EntityProjection;
use crate::statistics::BasicStatistics;
use crate::types::EntityId;

/// Writes the export tree to a local directory.
///
/// Every file is written to a temporary sibling first and then renamed into place, so readers
/// never observe a half-written file. Index updates are serialized through a lock.
#[derive(Debug, Clone)]
pub struct FileSystemOutputWriter {
    root: PathBuf,
    index_lock: Arc<Mutex<()>>,
}

impl FileSystemOutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    async fn read_index(&self) -> ExportResult<Option<IndexDocument>> {
        let path = self.index_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(export_error!(
                    ErrorKind::DestinationIoError,
                    "Failed to read the index",
                    path.display(),
                    source: err
                ));
            }
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn read_projection_entry(&self, entity_id: EntityId) -> ExportResult<IndexEntry> {
        let path = self.entity_path(entity_id).join(ENTITY_FILE);
        let bytes = fs::read(&path).await.map_err(|err| {
            export_error!(
                ErrorKind::DestinationIoError,
                "Failed to read the entity projection",
                path.display(),
                source: err
            )
        })?;

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_index(&self, entries: BTreeMap<EntityId, IndexEntry>) -> ExportResult<()> {
        let document = IndexDocument::new(entries);
        write_json_atomic(&self.index_path(), &document).await?;

        debug!(
            total_entities = document.total_entities,
            fully_processed = document.fully_processed_count,
            "index written"
        );

        Ok(())
    }

    /// Lists the entity directories present under the output root.
    async fn entity_directories(&self) -> ExportResult<Vec<EntityId>> {
        let mut entity_ids = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(entity_ids),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }

            if let Some(entity_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<EntityId>().ok())
            {
                entity_ids.push(entity_id);
            }
        }

        Ok(entity_ids)
    }
}

impl OutputWriter for FileSystemOutputWriter {
    fn entity_path(&self, entity_id: EntityId) -> PathBuf {
        self.root.join(entity_id.to_string())
    }

    async fn create_directory(&self, entity_id: EntityId) -> ExportResult<()> {
        let path = self.entity_path(entity_id);
        fs::create_dir_all(&path).await.map_err(|err| {
            export_error!(
                ErrorKind::DestinationIoError,
                "Failed to create the entity directory",
                path.display(),
                source: err
            )
        })
    }

    async fn write_category_files(
        &self,
        entity_id: EntityId,
        categories: &[CategoryPayload],
    ) -> ExportResult<()> {
        let directory = self.entity_path(entity_id);
        for payload in categories {
            let path = directory.join(format!("{}.json", payload.category().file_stem()));
            write_json_atomic(&path, payload).await?;
        }

        Ok(())
    }

    async fn update_entity_projection(
        &self,
        entity_id: EntityId,
        projection: &EntityProjection,
    ) -> ExportResult<()> {
        let path = self.entity_path(entity_id).join(ENTITY_FILE);
        write_json_atomic(&path, projection).await
    }

    async fn record_basic_statistics(
        &self,
        entity_id: EntityId,
        statistics: &BasicStatistics,
    ) -> ExportResult<()> {
        let path = self.entity_path(entity_id).join(STATISTICS_FILE);
        write_json_atomic(&path, statistics).await
    }

    async fn list_fully_processed(&self) -> ExportResult<HashSet<EntityId>> {
        let _guard = self.index_lock.lock().await;

        Ok(self
            .read_index()
            .await?
            .map(|document| document.fully_processed())
            .unwrap_or_default())
    }

    async fn regenerate_index(&self, entity_id: EntityId, mark_complete: bool) -> ExportResult<()> {
        let _guard = self.index_lock.lock().await;

        let mut entries = self
            .read_index()
            .await?
            .map(IndexDocument::into_entries)
            .unwrap_or_default();

        let mut entry = self.read_projection_entry(entity_id).await?;
        let previously_complete = entries
            .get(&entity_id)
            .is_some_and(|existing| existing.fully_processed);
        entry.fully_processed = mark_complete || previously_complete;
        entries.insert(entity_id, entry);

        self.write_index(entries).await
    }

    async fn finalize_index(&self) -> ExportResult<()> {
        let _guard = self.index_lock.lock().await;

        let mut previous = self
            .read_index()
            .await?
            .map(IndexDocument::into_entries)
            .unwrap_or_default();

        let mut entries = BTreeMap::new();
        for entity_id in self.entity_directories().await? {
            let previous_entry = previous.remove(&entity_id);

            match self.read_projection_entry(entity_id).await {
                Ok(mut entry) => {
                    entry.fully_processed = previous_entry
                        .as_ref()
                        .is_some_and(|existing| existing.fully_processed);
                    entries.insert(entity_id, entry);
                }
                Err(err) => {
                    warn!(
                        %entity_id,
                        error = %err,
                        "entity projection unreadable, keeping previous index entry"
                    );
                    if let Some(entry) = previous_entry {
                        entries.insert(entity_id, entry);
                    }
                }
            }
        }

        info!(total_entities = entries.len(), "index finalized");

        self.write_index(entries).await
    }

    async fn file_exists(&self, path: &str) -> bool {
        fs::try_exists(self.root.join(path)).await.unwrap_or(false)
    }
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it.
async fn write_json_atomic<T>(path: &Path, value: &T) -> ExportResult<()>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| {
        export_error!(
            ErrorKind::SerializationError,
            "Failed to serialize output file",
            path.display(),
            source: err
        )
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &bytes).await.map_err(|err| {
        export_error!(
            ErrorKind::DestinationIoError,
            "Failed to write output file",
            tmp_path.display(),
            source: err
        )
    })?;

    fs::rename(&tmp_path, path).await.map_err(|err| {
        export_error!(
            ErrorKind::DestinationIoError,
            "Failed to move output file into place",
            path.display(),
            source: err
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::classify::ResolvedAddresses;
    use crate::projection::{ProcessingLevel, ValidatedEntity};
    use serde_json::{Value, json};

    fn projection(entity_id: u64, level: ProcessingLevel) -> EntityProjection {
        let row = json!({
            "entityId": entity_id,
            "name": format!("Shop {entity_id}"),
            "status": "Active"
        })
        .as_object()
        .cloned()
        .unwrap();
        let entity = ValidatedEntity::validate(row).unwrap();

        EntityProjection::new(&entity, ResolvedAddresses::default(), level)
    }

    async fn write_entity(writer: &FileSystemOutputWriter, entity_id: u64, level: ProcessingLevel) {
        let id = EntityId::new(entity_id);
        writer.create_directory(id).await.unwrap();
        writer
            .update_entity_projection(id, &projection(entity_id, level))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn writes_one_file_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemOutputWriter::new(dir.path());
        let id = EntityId::new(12);

        writer.create_directory(id).await.unwrap();
        let categories: Vec<_> = Category::ALL
            .iter()
            .map(|category| CategoryPayload::empty(*category, id))
            .collect();
        writer.write_category_files(id, &categories).await.unwrap();

        for category in Category::ALL {
            let path = format!("12/{}.json", category.file_stem());
            assert!(writer.file_exists(&path).await, "missing {path}");
        }

        let bytes = fs::read(dir.path().join("12/core_business.json")).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["metadata"]["entityId"], json!(12));
        assert_eq!(value["fees"], json!([]));
        assert!(!writer.file_exists("12/core_business.json.tmp").await);
    }

    #[tokio::test]
    async fn regenerate_index_marks_entities_complete() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemOutputWriter::new(dir.path());

        assert!(writer.list_fully_processed().await.unwrap().is_empty());

        write_entity(&writer, 1, ProcessingLevel::Basic).await;
        write_entity(&writer, 2, ProcessingLevel::Full).await;
        writer.regenerate_index(EntityId::new(1), false).await.unwrap();
        writer.regenerate_index(EntityId::new(2), true).await.unwrap();

        assert!(writer.file_exists(INDEX_FILE).await);
        assert_eq!(
            writer.list_fully_processed().await.unwrap(),
            HashSet::from([EntityId::new(2)])
        );

        // A later refresh without the flag keeps it set.
        writer.regenerate_index(EntityId::new(2), false).await.unwrap();
        assert!(writer.list_fully_processed().await.unwrap().contains(&EntityId::new(2)));
    }

    #[tokio::test]
    async fn finalize_index_lists_every_entity_and_keeps_flags() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemOutputWriter::new(dir.path());

        write_entity(&writer, 5, ProcessingLevel::Full).await;
        writer.regenerate_index(EntityId::new(5), true).await.unwrap();
        write_entity(&writer, 3, ProcessingLevel::Basic).await;
        fs::create_dir_all(dir.path().join("not-an-entity")).await.unwrap();

        writer.finalize_index().await.unwrap();

        let bytes = fs::read(dir.path().join(INDEX_FILE)).await.unwrap();
        let document: IndexDocument = serde_json::from_slice(&bytes).unwrap();
        let ids: Vec<_> = document.entities.iter().map(|entry| entry.entity_id).collect();

        assert_eq!(ids, vec![EntityId::new(3), EntityId::new(5)]);
        assert_eq!(document.fully_processed_count, 1);
        assert!(document.entities[1].fully_processed);
        assert_eq!(document.entities[1].processing_level, ProcessingLevel::Full);
    }

    #[tokio::test]
    async fn regenerate_index_fails_without_projection() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemOutputWriter::new(dir.path());

        let err = writer
            .regenerate_index(EntityId::new(9), true)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationIoError);
    }
}
