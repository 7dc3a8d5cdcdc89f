use futures::{Stream, StreamExt, stream};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::category::{ENTITY_EMPLOYEE, ENTITY_LOCATION, ENTITY_TABLE, TableScope};
use crate::conversions::value::{ACTIVE_COLUMN, STATUS_COLUMN};
use crate::error::{ErrorKind, ExportResult};
use crate::source::{
    ACTIVE_EMPLOYEES_COLUMN, ACTIVE_LOCATIONS_COLUMN, COUNT_COLUMN, Source, SourceQuery,
};
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};
use crate::{bail, export_error};

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, Vec<Row>>,
    failing_tables: HashSet<String>,
    fail_simple_shop_query: bool,
    queries: Vec<SourceQuery>,
    scans: Vec<&'static str>,
}

/// In-memory [`Source`] that evaluates [`SourceQuery`] values against stored rows.
///
/// Every query is recorded so tests can assert how often the source was hit. Tables can be
/// marked as failing to exercise degradation paths.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Appends rows to a table.
    pub async fn insert_rows(&self, table: &str, rows: Vec<Row>) {
        let mut inner = self.inner.lock().await;
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Makes every query and scan touching `table` fail.
    pub async fn fail_table(&self, table: &str) {
        let mut inner = self.inner.lock().await;
        inner.failing_tables.insert(table.to_string());
    }

    /// Makes the Simple Shop aggregate query fail.
    pub async fn fail_simple_shop_query(&self) {
        let mut inner = self.inner.lock().await;
        inner.fail_simple_shop_query = true;
    }

    /// Returns every recorded query in execution order.
    pub async fn queries(&self) -> Vec<SourceQuery> {
        self.inner.lock().await.queries.clone()
    }

    /// Number of queries whose primary table is `table`.
    pub async fn query_count(&self, table: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .queries
            .iter()
            .filter(|query| query.table_name() == table)
            .count()
    }

    pub async fn total_queries(&self) -> usize {
        self.inner.lock().await.queries.len()
    }

    /// Number of full scans started on `table`.
    pub async fn scan_count(&self, table: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.scans.iter().filter(|scanned| **scanned == table).count()
    }

    pub async fn clear_queries(&self) {
        let mut inner = self.inner.lock().await;
        inner.queries.clear();
        inner.scans.clear();
    }

    async fn scan_pages(
        &self,
        table: &'static str,
        batch_size: usize,
    ) -> Vec<ExportResult<Vec<Row>>> {
        let mut inner = self.inner.lock().await;
        inner.scans.push(table);

        if inner.failing_tables.contains(table) {
            return vec![Err(export_error!(
                ErrorKind::SourceQueryFailed,
                "Injected scan failure",
                table
            ))];
        }

        inner
            .tables
            .get(table)
            .map(|rows| {
                rows.chunks(batch_size.max(1))
                    .map(|page| Ok(page.to_vec()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for MemorySource {
    async fn query(&self, query: &SourceQuery) -> ExportResult<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        inner.queries.push(query.clone());

        if inner.failing_tables.contains(query.table_name()) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Injected query failure",
                query.table_name()
            );
        }

        match query {
            SourceQuery::EntityById(entity_id) => {
                Ok(rows_of_entities(inner.table(ENTITY_TABLE), &[*entity_id]))
            }
            SourceQuery::ScopedRows { table, entity_ids } => match table.scope {
                TableScope::Direct => Ok(rows_of_entities(inner.table(table.name), entity_ids)),
                TableScope::ViaParent {
                    parent,
                    join_column,
                } => {
                    let parent_keys: Vec<Value> =
                        rows_of_entities(inner.table(parent), entity_ids)
                            .into_iter()
                            .filter_map(|mut row| row.remove(join_column))
                            .collect();

                    Ok(inner
                        .table(table.name)
                        .iter()
                        .filter(|row| {
                            row.get(join_column)
                                .is_some_and(|key| parent_keys.contains(key))
                        })
                        .cloned()
                        .collect())
                }
            },
            SourceQuery::CountByEntity { table, active_only } => Ok(count_by_entity(
                inner.table(table),
                *active_only,
            )
            .into_iter()
            .map(|(entity_id, total)| count_row(entity_id, &[(COUNT_COLUMN, total)]))
            .collect()),
            SourceQuery::SimpleShopCandidates {
                max_active_locations,
                max_active_employees_exclusive,
                excluded_statuses,
            } => {
                if inner.fail_simple_shop_query {
                    bail!(
                        ErrorKind::SourceQueryFailed,
                        "Injected simple shop query failure"
                    );
                }

                let locations = count_by_entity(inner.table(ENTITY_LOCATION.name), true);
                let employees = count_by_entity(inner.table(ENTITY_EMPLOYEE.name), true);

                Ok(inner
                    .table(ENTITY_TABLE)
                    .iter()
                    .filter(|row| status_passes(row, excluded_statuses))
                    .filter_map(|row| EntityId::from_row(row, ENTITY_ID_COLUMN))
                    .filter_map(|entity_id| {
                        let location_count = locations.get(&entity_id).copied().unwrap_or(0);
                        let employee_count = employees.get(&entity_id).copied().unwrap_or(0);

                        (location_count <= *max_active_locations
                            && employee_count < *max_active_employees_exclusive)
                            .then(|| {
                                count_row(
                                    entity_id,
                                    &[
                                        (ACTIVE_LOCATIONS_COLUMN, location_count),
                                        (ACTIVE_EMPLOYEES_COLUMN, employee_count),
                                    ],
                                )
                            })
                    })
                    .collect())
            }
        }
    }

    fn scan_table(
        &self,
        table: &'static str,
        batch_size: usize,
    ) -> impl Stream<Item = ExportResult<Vec<Row>>> + Send + '_ {
        stream::once(self.scan_pages(table, batch_size)).flat_map(stream::iter)
    }
}

impl Inner {
    fn table(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

fn rows_of_entities(rows: &[Row], entity_ids: &[EntityId]) -> Vec<Row> {
    rows.iter()
        .filter(|row| {
            EntityId::from_row(row, ENTITY_ID_COLUMN).is_some_and(|id| entity_ids.contains(&id))
        })
        .cloned()
        .collect()
}

/// Mirrors `active = 1` in MySQL, where booleans are stored as `TINYINT(1)`.
fn sql_active(row: &Row) -> bool {
    match row.get(ACTIVE_COLUMN) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64() == Some(1.0),
        Some(Value::String(text)) => text.trim() == "1",
        _ => false,
    }
}

/// Mirrors `status IS NULL OR status NOT IN (...)` with a case-insensitive collation.
fn status_passes(row: &Row, excluded_statuses: &[String]) -> bool {
    if excluded_statuses.is_empty() {
        return true;
    }

    match row.get(STATUS_COLUMN) {
        None | Some(Value::Null) => true,
        Some(Value::String(status)) => !excluded_statuses
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(status)),
        Some(other) => !excluded_statuses
            .iter()
            .any(|excluded| *excluded == other.to_string()),
    }
}

fn count_by_entity(rows: &[Row], active_only: bool) -> BTreeMap<EntityId, u64> {
    let mut counts = BTreeMap::new();
    for row in rows {
        if active_only && !sql_active(row) {
            continue;
        }
        if let Some(entity_id) = EntityId::from_row(row, ENTITY_ID_COLUMN) {
            *counts.entry(entity_id).or_insert(0) += 1;
        }
    }

    counts
}

fn count_row(entity_id: EntityId, counts: &[(&str, u64)]) -> Row {
    let mut row = Row::new();
    row.insert(ENTITY_ID_COLUMN.to_string(), Value::from(entity_id.into_inner()));
    for (column, count) in counts {
        row.insert((*column).to_string(), Value::from(*count));
    }

    row
}
