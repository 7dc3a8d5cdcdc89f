use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::cache::EntityCache;
use crate::category::TableSpec;
use crate::source::{Source, SourceQuery};
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};

/// Result of a bulk preload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PreloadOutcome {
    /// The ID set was larger than the threshold; entities load lazily instead.
    Skipped {
        requested: usize,
        max_entities: usize,
    },
    /// One query was attempted per table.
    Completed {
        tables_loaded: usize,
        tables_failed: usize,
        rows: usize,
    },
}

impl PreloadOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, PreloadOutcome::Skipped { .. })
    }
}

/// Fills an [`EntityCache`] for many entities with one query per table.
///
/// Every requested entity ends up with an entry per table, including an empty entry when
/// the table has no rows for it. Entities already resident for a table are not queried
/// again. When a table's query fails the table is left uncached for the whole set, so those
/// entities fall back to lazy loads later.
#[derive(Debug)]
pub struct BulkPreloader<'a, S> {
    source: &'a S,
    cache: &'a EntityCache,
    max_entities: usize,
}

impl<'a, S> BulkPreloader<'a, S>
where
    S: Source,
{
    pub fn new(source: &'a S, cache: &'a EntityCache, max_entities: usize) -> Self {
        Self {
            source,
            cache,
            max_entities,
        }
    }

    /// Preloads `tables`, which must be second-level tables, for `entity_ids`.
    ///
    /// Nothing is loaded when `entity_ids` is larger than the threshold.
    pub async fn preload<I>(&self, tables: I, entity_ids: &[EntityId]) -> PreloadOutcome
    where
        I: IntoIterator<Item = &'static TableSpec>,
    {
        if entity_ids.len() > self.max_entities {
            info!(
                requested = entity_ids.len(),
                max_entities = self.max_entities,
                "entity set exceeds preload threshold, falling back to lazy loads"
            );

            return PreloadOutcome::Skipped {
                requested: entity_ids.len(),
                max_entities: self.max_entities,
            };
        }

        self.load_tables(tables, entity_ids, entity_ids.len()).await
    }

    /// Preloads `tables` for every entity in `entity_ids`, ignoring the threshold.
    ///
    /// Each table is queried once per chunk of at most `chunk_size` entities. A table counts
    /// as failed when any of its chunks failed.
    pub async fn preload_in_chunks<I>(
        &self,
        tables: I,
        entity_ids: &[EntityId],
        chunk_size: usize,
    ) -> PreloadOutcome
    where
        I: IntoIterator<Item = &'static TableSpec>,
    {
        self.load_tables(tables, entity_ids, chunk_size).await
    }

    async fn load_tables<I>(
        &self,
        tables: I,
        entity_ids: &[EntityId],
        chunk_size: usize,
    ) -> PreloadOutcome
    where
        I: IntoIterator<Item = &'static TableSpec>,
    {
        let mut tables_loaded = 0;
        let mut tables_failed = 0;
        let mut total_rows = 0;

        if entity_ids.is_empty() {
            return PreloadOutcome::Completed {
                tables_loaded,
                tables_failed,
                rows: total_rows,
            };
        }

        for table in tables {
            debug_assert!(table.is_second_level());

            let mut missing = Vec::with_capacity(entity_ids.len());
            for entity_id in entity_ids {
                if !self.cache.contains(table.name, *entity_id).await {
                    missing.push(*entity_id);
                }
            }

            let mut failed = false;
            for chunk in missing.chunks(chunk_size.max(1)) {
                match self.load_chunk(table, chunk).await {
                    Some(rows) => total_rows += rows,
                    None => failed = true,
                }
            }

            if failed {
                tables_failed += 1;
            } else {
                tables_loaded += 1;
            }
        }

        info!(
            entities = entity_ids.len(),
            tables_loaded, tables_failed, rows = total_rows, "bulk preload completed"
        );

        PreloadOutcome::Completed {
            tables_loaded,
            tables_failed,
            rows: total_rows,
        }
    }

    /// Loads one IN-list of entities for `table`, returning the number of rows cached.
    async fn load_chunk(
        &self,
        table: &'static TableSpec,
        entity_ids: &[EntityId],
    ) -> Option<usize> {
        let query = SourceQuery::ScopedRows {
            table,
            entity_ids: entity_ids.to_vec(),
        };

        let rows = match self.source.query(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(
                    table = table.name,
                    entities = entity_ids.len(),
                    error = %err,
                    "bulk preload failed, table left for lazy loads"
                );
                return None;
            }
        };

        let row_count = rows.len();
        let mut grouped = group_by_entity(table, rows);

        for entity_id in entity_ids {
            let rows = grouped.remove(entity_id).unwrap_or_default();
            self.cache.insert(table.name, *entity_id, rows).await;
        }

        Some(row_count)
    }
}

fn group_by_entity(table: &TableSpec, rows: Vec<Row>) -> HashMap<EntityId, Vec<Row>> {
    let mut grouped: HashMap<EntityId, Vec<Row>> = HashMap::new();

    for row in rows {
        match EntityId::from_row(&row, ENTITY_ID_COLUMN) {
            Some(entity_id) => grouped.entry(entity_id).or_default().push(row),
            None => debug!(table = table.name, "dropping preloaded row without entity id"),
        }
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{ENTITY_EMPLOYEE, ENTITY_FEE, ENTITY_LOCATION, SECOND_LEVEL_TABLES};
    use crate::test_utils::memory_source::MemorySource;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<EntityId> {
        range.map(EntityId::new).collect()
    }

    #[tokio::test]
    async fn preload_issues_one_query_per_table_and_caches_empty_results() {
        let source = MemorySource::new();
        source
            .insert_rows(
                "EntityLocation",
                vec![
                    row(json!({"entityLocationId": 1, "entityId": 1})),
                    row(json!({"entityLocationId": 2, "entityId": 1})),
                    row(json!({"entityLocationId": 3, "entityId": 3})),
                ],
            )
            .await;
        let cache = EntityCache::new();
        let preloader = BulkPreloader::new(&source, &cache, 100);

        let outcome = preloader
            .preload([&ENTITY_LOCATION, &ENTITY_EMPLOYEE], &ids(1..=3))
            .await;

        assert_eq!(
            outcome,
            PreloadOutcome::Completed {
                tables_loaded: 2,
                tables_failed: 0,
                rows: 3,
            }
        );
        assert_eq!(source.query_count("EntityLocation").await, 1);
        assert_eq!(source.query_count("EntityEmployee").await, 1);
        assert_eq!(
            cache.get("EntityLocation", EntityId::new(1)).await.unwrap().len(),
            2
        );
        assert!(
            cache
                .get("EntityLocation", EntityId::new(2))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(cache.contains("EntityEmployee", EntityId::new(3)).await);
    }

    #[tokio::test]
    async fn preload_is_skipped_above_threshold() {
        let source = MemorySource::new();
        let cache = EntityCache::new();
        let preloader = BulkPreloader::new(&source, &cache, 100);

        let outcome = preloader.preload(&SECOND_LEVEL_TABLES, &ids(1..=150)).await;

        assert!(outcome.is_skipped());
        assert_eq!(source.total_queries().await, 0);
        assert!(cache.resident_entities().await.is_empty());
    }

    #[tokio::test]
    async fn resident_entities_are_not_queried_again() {
        let source = MemorySource::new();
        let cache = EntityCache::new();
        cache.insert("EntityFee", EntityId::new(1), vec![]).await;
        cache.insert("EntityFee", EntityId::new(2), vec![]).await;
        let preloader = BulkPreloader::new(&source, &cache, 100);

        preloader.preload([&ENTITY_FEE], &ids(1..=2)).await;
        assert_eq!(source.query_count("EntityFee").await, 0);

        preloader.preload([&ENTITY_FEE], &ids(1..=3)).await;
        let queries = source.queries().await;
        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries[0],
            SourceQuery::ScopedRows {
                table: &ENTITY_FEE,
                entity_ids: vec![EntityId::new(3)],
            }
        );
    }

    #[tokio::test]
    async fn failing_table_is_left_uncached() {
        let source = MemorySource::new();
        source.fail_table("EntityFee").await;
        let cache = EntityCache::new();
        let preloader = BulkPreloader::new(&source, &cache, 100);

        let outcome = preloader
            .preload([&ENTITY_FEE, &ENTITY_EMPLOYEE], &ids(1..=2))
            .await;

        assert_eq!(
            outcome,
            PreloadOutcome::Completed {
                tables_loaded: 1,
                tables_failed: 1,
                rows: 0,
            }
        );
        assert!(!cache.contains("EntityFee", EntityId::new(1)).await);
        assert!(cache.contains("EntityEmployee", EntityId::new(1)).await);
    }

    #[tokio::test]
    async fn chunked_preload_ignores_threshold_and_splits_in_lists() {
        let source = MemorySource::new();
        source
            .insert_rows(
                "EntityLocation",
                vec![
                    row(json!({"entityLocationId": 1, "entityId": 1})),
                    row(json!({"entityLocationId": 2, "entityId": 250})),
                ],
            )
            .await;
        let cache = EntityCache::new();
        let preloader = BulkPreloader::new(&source, &cache, 100);

        let outcome = preloader
            .preload_in_chunks([&ENTITY_LOCATION, &ENTITY_EMPLOYEE], &ids(1..=250), 100)
            .await;

        assert_eq!(
            outcome,
            PreloadOutcome::Completed {
                tables_loaded: 2,
                tables_failed: 0,
                rows: 2,
            }
        );
        assert_eq!(source.query_count("EntityLocation").await, 3);
        assert_eq!(source.query_count("EntityEmployee").await, 3);
        assert_eq!(cache.resident_entities().await.len(), 250);
        assert_eq!(
            cache.get("EntityLocation", EntityId::new(250)).await.unwrap().len(),
            1
        );
    }
}
