use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;
use tracing::debug;

use crate::bail;
use crate::cache::EntityCache;
use crate::category::Category;
use crate::error::{ErrorKind, ExportResult};
use crate::source::{Source, SourceQuery};
use crate::types::{EntityId, Row};

/// Metadata block stored alongside the table arrays of a category payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMetadata {
    pub entity_id: EntityId,
    pub category: Category,
    pub total_records: usize,
    pub table_count: usize,
    pub export_timestamp: DateTime<Utc>,
}

/// All rows of one category for one entity.
///
/// Serializes as an object with one array per member table, in catalog order, followed by a
/// `metadata` object. Full and empty payloads of a category have the same keys.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPayload {
    tables: Vec<(&'static str, Arc<Vec<Row>>)>,
    metadata: CategoryMetadata,
}

impl CategoryPayload {
    fn new(
        category: Category,
        entity_id: EntityId,
        tables: Vec<(&'static str, Arc<Vec<Row>>)>,
        export_timestamp: DateTime<Utc>,
    ) -> Self {
        let total_records = tables.iter().map(|(_, rows)| rows.len()).sum();

        Self {
            metadata: CategoryMetadata {
                entity_id,
                category,
                total_records,
                table_count: category.table_count(),
                export_timestamp,
            },
            tables,
        }
    }

    /// Builds the empty shell of a category: every table key with an empty array.
    pub fn empty(category: Category, entity_id: EntityId) -> Self {
        let empty = Arc::new(Vec::new());
        let tables = category
            .tables()
            .iter()
            .map(|table| (table.key, empty.clone()))
            .collect();

        Self::new(category, entity_id, tables, Utc::now())
    }

    pub fn category(&self) -> Category {
        self.metadata.category
    }

    pub fn metadata(&self) -> &CategoryMetadata {
        &self.metadata
    }

    /// Returns the rows stored under a table key.
    pub fn rows(&self, key: &str) -> Option<&[Row]> {
        self.tables
            .iter()
            .find(|(table_key, _)| *table_key == key)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Table keys in payload order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|(key, _)| *key)
    }
}

impl Serialize for CategoryPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tables.len() + 1))?;
        for (key, rows) in &self.tables {
            map.serialize_entry(key, rows.as_slice())?;
        }
        map.serialize_entry("metadata", &self.metadata)?;
        map.end()
    }
}

/// The root row of an entity together with its seven full category payloads.
#[derive(Debug, Clone)]
pub struct EntityExport {
    pub entity: Row,
    pub categories: Vec<CategoryPayload>,
}

impl EntityExport {
    pub fn category(&self, category: Category) -> Option<&CategoryPayload> {
        self.categories
            .iter()
            .find(|payload| payload.category() == category)
    }
}

/// Assembles category payloads from cached or freshly loaded table rows.
#[derive(Debug)]
pub struct CategoryAssembler<'a, S> {
    source: &'a S,
    cache: &'a EntityCache,
}

impl<'a, S> CategoryAssembler<'a, S>
where
    S: Source,
{
    pub fn new(source: &'a S, cache: &'a EntityCache) -> Self {
        Self { source, cache }
    }

    /// Loads every member table of `category` concurrently.
    ///
    /// Failed tables contribute an empty array and are not counted in `totalRecords`.
    pub async fn load_category(&self, category: Category, entity_id: EntityId) -> CategoryPayload {
        let loads = category
            .tables()
            .iter()
            .map(|table| self.cache.load(self.source, table, entity_id));
        let results = join_all(loads).await;

        let tables = category
            .tables()
            .iter()
            .zip(results)
            .map(|(table, rows)| (table.key, rows))
            .collect();

        let payload = CategoryPayload::new(category, entity_id, tables, Utc::now());

        debug!(
            %entity_id,
            category = category.name(),
            total_records = payload.metadata.total_records,
            "category assembled"
        );

        payload
    }

    /// Builds the empty shell of `category`.
    pub fn empty_category(&self, category: Category, entity_id: EntityId) -> CategoryPayload {
        CategoryPayload::empty(category, entity_id)
    }

    /// Reads the root row and assembles all seven categories.
    ///
    /// Fails only when the root row cannot be read or does not exist.
    pub async fn load_all_categories(&self, entity_id: EntityId) -> ExportResult<EntityExport> {
        let entity = load_entity_row(self.source, entity_id).await?;

        let categories = join_all(
            Category::ALL
                .into_iter()
                .map(|category| self.load_category(category, entity_id)),
        )
        .await;

        Ok(EntityExport { entity, categories })
    }
}

/// Reads the `Entity` row of `entity_id`.
pub(crate) async fn load_entity_row<S>(source: &S, entity_id: EntityId) -> ExportResult<Row>
where
    S: Source,
{
    let rows = source.query(&SourceQuery::EntityById(entity_id)).await?;

    match rows.into_iter().next() {
        Some(row) => Ok(row),
        None => bail!(
            ErrorKind::MissingEntity,
            "Entity row not found",
            format!("entity {entity_id} does not exist in the source")
        ),
    }
}
