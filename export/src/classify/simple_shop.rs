use export_config::shared::SimpleShopConfig;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::info;

use crate::conversions::value::{is_active_row, non_empty_str};
use crate::error::ExportResult;
use crate::source::{Source, SourceQuery};
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};

/// Primary key column of `EntityLocation`.
pub(super) const LOCATION_ID_COLUMN: &str = "entityLocationId";

/// Primary key column of `EntityEmployee`.
const EMPLOYEE_ID_COLUMN: &str = "entityEmployeeId";

/// Finds Simple Shops with a single aggregate query.
#[derive(Debug)]
pub struct SimpleShopClassifier<'a, S> {
    source: &'a S,
    config: &'a SimpleShopConfig,
}

impl<'a, S> SimpleShopClassifier<'a, S>
where
    S: Source,
{
    pub fn new(source: &'a S, config: &'a SimpleShopConfig) -> Self {
        Self { source, config }
    }

    /// Returns the IDs of all entities that qualify as Simple Shops.
    ///
    /// Active rows are counted with the database's `active = 1` semantics.
    pub async fn classify(&self) -> ExportResult<BTreeSet<EntityId>> {
        let query = SourceQuery::SimpleShopCandidates {
            max_active_locations: self.config.max_active_locations,
            max_active_employees_exclusive: self.config.max_active_employees_exclusive,
            excluded_statuses: self.config.excluded_statuses.clone(),
        };

        let simple_shops: BTreeSet<EntityId> = self
            .source
            .query(&query)
            .await?
            .iter()
            .filter_map(|row| EntityId::from_row(row, ENTITY_ID_COLUMN))
            .collect();

        info!(simple_shops = simple_shops.len(), "classified simple shops");

        Ok(simple_shops)
    }
}

/// Simple Shop markers merged into an entity projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleShopInfo {
    pub is_simple_shop: bool,
    pub location_count: usize,
    pub employee_count: usize,
    pub location_names: Vec<String>,
    pub employee_names: Vec<String>,
}

impl SimpleShopInfo {
    /// Derives the markers from an entity's location and employee rows.
    ///
    /// Only rows whose `active` value is truthy are counted and named.
    pub fn from_rows(locations: &[Row], employees: &[Row]) -> Self {
        let location_names = active_names(locations, LOCATION_ID_COLUMN);
        let employee_names = active_names(employees, EMPLOYEE_ID_COLUMN);

        Self {
            is_simple_shop: true,
            location_count: location_names.len(),
            employee_count: employee_names.len(),
            location_names,
            employee_names,
        }
    }
}

fn active_names(rows: &[Row], id_column: &str) -> Vec<String> {
    rows.iter()
        .filter(|row| is_active_row(row))
        .enumerate()
        .map(|(position, row)| display_name(row, id_column, position))
        .collect()
}

/// Picks `title`, then `name`, then `#<id>` as the display name of a row.
fn display_name(row: &Row, id_column: &str, position: usize) -> String {
    if let Some(title) = non_empty_str(row, "title") {
        return title.to_string();
    }

    if let Some(name) = non_empty_str(row, "name") {
        return name.to_string();
    }

    match row.get(id_column) {
        Some(Value::Number(id)) => format!("#{id}"),
        Some(Value::String(id)) if !id.trim().is_empty() => format!("#{}", id.trim()),
        _ => format!("#{}", position + 1),
    }
}
