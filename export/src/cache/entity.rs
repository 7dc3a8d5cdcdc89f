use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::category::TableSpec;
use crate::source::{Source, SourceQuery};
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};

/// Counters describing how the cache was used during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Reads answered from memory.
    pub hits: u64,
    /// Reads that had to query the source.
    pub misses: u64,
    /// Source queries that failed and were cached as empty.
    pub failed_loads: u64,
    /// Rows dropped because they belonged to another entity.
    pub dropped_rows: u64,
}

#[derive(Debug, Default)]
struct Inner {
    /// Table name to per-entity rows. An empty vector means "loaded, no rows".
    tables: HashMap<&'static str, HashMap<EntityId, Arc<Vec<Row>>>>,
    stats: CacheStats,
}

/// Read-through cache of dependent rows keyed by table and entity.
///
/// An entry is either absent or holds the complete result of one scoped query; partial
/// entries never exist. The lock is released while the source is queried, so concurrent
/// loads of different tables proceed in parallel. When two loads race on the same key the
/// first stored result wins.
#[derive(Debug, Clone)]
pub struct EntityCache {
    inner: Arc<Mutex<Inner>>,
}

impl EntityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Returns the cached rows without touching the source.
    pub async fn get(&self, table: &str, entity_id: EntityId) -> Option<Arc<Vec<Row>>> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .and_then(|entries| entries.get(&entity_id))
            .cloned()
    }

    /// Returns `true` if an entry, possibly empty, exists for the key.
    pub async fn contains(&self, table: &str, entity_id: EntityId) -> bool {
        self.get(table, entity_id).await.is_some()
    }

    /// Stores a complete result for one entity, keeping an entry that is already present.
    pub async fn insert(
        &self,
        table: &'static str,
        entity_id: EntityId,
        rows: Vec<Row>,
    ) -> Arc<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .entry(table)
            .or_default()
            .entry(entity_id)
            .or_insert_with(|| Arc::new(rows))
            .clone()
    }

    /// Returns the rows of `table` for `entity_id`, querying the source on a miss.
    ///
    /// A failed query is logged and cached as an empty result, so one broken table never
    /// fails the entity under assembly.
    pub async fn load<S>(
        &self,
        source: &S,
        table: &'static TableSpec,
        entity_id: EntityId,
    ) -> Arc<Vec<Row>>
    where
        S: Source,
    {
        {
            let mut inner = self.inner.lock().await;
            let cached = inner
                .tables
                .get(table.name)
                .and_then(|entries| entries.get(&entity_id))
                .cloned();

            if let Some(rows) = cached {
                inner.stats.hits += 1;
                return rows;
            }

            inner.stats.misses += 1;
        }

        debug!(table = table.name, %entity_id, "cache miss, querying source");

        let rows = match source.query(&SourceQuery::scoped(table, entity_id)).await {
            Ok(rows) => {
                let (rows, dropped) = retain_owned_rows(table, entity_id, rows);
                if dropped > 0 {
                    self.inner.lock().await.stats.dropped_rows += dropped as u64;
                }
                rows
            }
            Err(err) => {
                warn!(
                    table = table.name,
                    %entity_id,
                    error = %err,
                    "failed to load table rows, caching an empty result"
                );
                self.inner.lock().await.stats.failed_loads += 1;
                vec![]
            }
        };

        self.insert(table.name, entity_id, rows).await
    }

    /// Removes every entry of one entity and returns how many entries were dropped.
    pub async fn evict_entity(&self, entity_id: EntityId) -> usize {
        let mut inner = self.inner.lock().await;
        let evicted = inner
            .tables
            .values_mut()
            .filter_map(|entries| entries.remove(&entity_id))
            .count();
        inner.tables.retain(|_, entries| !entries.is_empty());

        debug!(%entity_id, evicted, "evicted entity from cache");

        evicted
    }

    /// Empties every table cache and returns how many entries were dropped.
    pub async fn evict_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let evicted = inner.tables.values().map(HashMap::len).sum();
        inner.tables.clear();

        evicted
    }

    /// Distinct entities with at least one cached entry.
    pub async fn resident_entities(&self) -> HashSet<EntityId> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .values()
            .flat_map(|entries| entries.keys().copied())
            .collect()
    }

    /// Total number of cached rows across all tables.
    pub async fn resident_rows(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .tables
            .values()
            .flat_map(|entries| entries.values())
            .map(|rows| rows.len())
            .sum()
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops rows of second-level tables whose `entityId` differs from `entity_id`.
///
/// Returns the kept rows and the number of dropped rows.
pub(crate) fn retain_owned_rows(
    table: &TableSpec,
    entity_id: EntityId,
    rows: Vec<Row>,
) -> (Vec<Row>, usize) {
    if !table.is_second_level() {
        return (rows, 0);
    }

    let total = rows.len();
    let kept: Vec<Row> = rows
        .into_iter()
        .filter(|row| match EntityId::from_row(row, ENTITY_ID_COLUMN) {
            Some(owner) if owner != entity_id => {
                warn!(
                    table = table.name,
                    %entity_id,
                    %owner,
                    "dropping row that belongs to another entity"
                );
                false
            }
            _ => true,
        })
        .collect();
    let dropped = total - kept.len();

    (kept, dropped)
}
