use std::fmt::Write;

use crate::category::{ENTITY_EMPLOYEE, ENTITY_LOCATION, ENTITY_TABLE, TableScope, TableSpec};
use crate::conversions::value::{ACTIVE_COLUMN, STATUS_COLUMN};
use crate::types::{ENTITY_ID_COLUMN, EntityId};

/// Column alias holding the row count of [`SourceQuery::CountByEntity`].
pub const COUNT_COLUMN: &str = "total";

/// Column alias holding the active location count of [`SourceQuery::SimpleShopCandidates`].
pub const ACTIVE_LOCATIONS_COLUMN: &str = "activeLocations";

/// Column alias holding the active employee count of [`SourceQuery::SimpleShopCandidates`].
pub const ACTIVE_EMPLOYEES_COLUMN: &str = "activeEmployees";

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    UInt(u64),
    Text(String),
}

/// The queries the exporter issues against the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceQuery {
    /// The root `Entity` row of one tenant.
    EntityById(EntityId),
    /// Every row of `table` belonging to the given entities.
    ///
    /// Second-level tables filter on their own `entityId` column. Third-level tables are
    /// joined through their parent and return only the child's columns.
    ScopedRows {
        table: &'static TableSpec,
        entity_ids: Vec<EntityId>,
    },
    /// Row counts of `table` grouped by `entityId`, optionally restricted to `active = 1`.
    CountByEntity {
        table: &'static str,
        active_only: bool,
    },
    /// Entities whose active location and employee counts are under the given limits and
    /// whose status is not excluded.
    SimpleShopCandidates {
        max_active_locations: u64,
        max_active_employees_exclusive: u64,
        excluded_statuses: Vec<String>,
    },
}

impl SourceQuery {
    /// Builds a scoped query for a single entity.
    pub fn scoped(table: &'static TableSpec, entity_id: EntityId) -> Self {
        SourceQuery::ScopedRows {
            table,
            entity_ids: vec![entity_id],
        }
    }

    /// Name of the table the query reads primarily.
    pub fn table_name(&self) -> &'static str {
        match self {
            SourceQuery::EntityById(_) | SourceQuery::SimpleShopCandidates { .. } => ENTITY_TABLE,
            SourceQuery::ScopedRows { table, .. } => table.name,
            SourceQuery::CountByEntity { table, .. } => *table,
        }
    }

    /// Renders the query as MySQL with `?` placeholders matching [`SourceQuery::params`].
    pub fn sql(&self) -> String {
        match self {
            SourceQuery::EntityById(_) => format!(
                "SELECT * FROM {} WHERE {} = ?",
                quote_identifier(ENTITY_TABLE),
                quote_identifier(ENTITY_ID_COLUMN)
            ),
            SourceQuery::ScopedRows { table, entity_ids } => {
                let filter = id_filter(entity_ids.len());
                match table.scope {
                    TableScope::Direct => format!(
                        "SELECT * FROM {} WHERE {}{filter}",
                        quote_identifier(table.name),
                        quote_identifier(ENTITY_ID_COLUMN)
                    ),
                    TableScope::ViaParent {
                        parent,
                        join_column,
                    } => format!(
                        "SELECT c.* FROM {} AS c INNER JOIN {} AS p ON p.{join} = c.{join} \
                         WHERE p.{}{filter}",
                        quote_identifier(table.name),
                        quote_identifier(parent),
                        quote_identifier(ENTITY_ID_COLUMN),
                        join = quote_identifier(join_column),
                    ),
                }
            }
            SourceQuery::CountByEntity { table, active_only } => {
                let mut sql = format!(
                    "SELECT {id}, COUNT(*) AS {count} FROM {table}",
                    id = quote_identifier(ENTITY_ID_COLUMN),
                    count = quote_identifier(COUNT_COLUMN),
                    table = quote_identifier(table),
                );
                if *active_only {
                    let _ = write!(sql, " WHERE {} = 1", quote_identifier(ACTIVE_COLUMN));
                }
                let _ = write!(sql, " GROUP BY {}", quote_identifier(ENTITY_ID_COLUMN));
                sql
            }
            SourceQuery::SimpleShopCandidates {
                excluded_statuses, ..
            } => simple_shop_sql(excluded_statuses.len()),
        }
    }

    /// Positional parameters in placeholder order.
    pub fn params(&self) -> Vec<QueryParam> {
        match self {
            SourceQuery::EntityById(entity_id) => vec![QueryParam::UInt(entity_id.into_inner())],
            SourceQuery::ScopedRows { entity_ids, .. } => entity_ids
                .iter()
                .map(|id| QueryParam::UInt(id.into_inner()))
                .collect(),
            SourceQuery::CountByEntity { .. } => vec![],
            SourceQuery::SimpleShopCandidates {
                max_active_locations,
                max_active_employees_exclusive,
                excluded_statuses,
            } => {
                let mut params: Vec<QueryParam> = excluded_statuses
                    .iter()
                    .cloned()
                    .map(QueryParam::Text)
                    .collect();
                params.push(QueryParam::UInt(*max_active_locations));
                params.push(QueryParam::UInt(*max_active_employees_exclusive));
                params
            }
        }
    }
}

/// Quotes a MySQL identifier with backticks.
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn id_filter(count: usize) -> String {
    match count {
        0 => " IN (NULL)".to_string(),
        1 => " = ?".to_string(),
        n => format!(" IN ({})", placeholders(n)),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn active_count_subquery(table: &str) -> String {
    format!(
        "SELECT {id}, COUNT(*) AS {count} FROM {table} WHERE {active} = 1 GROUP BY {id}",
        id = quote_identifier(ENTITY_ID_COLUMN),
        count = quote_identifier(COUNT_COLUMN),
        table = quote_identifier(table),
        active = quote_identifier(ACTIVE_COLUMN),
    )
}

fn simple_shop_sql(excluded_status_count: usize) -> String {
    let id = quote_identifier(ENTITY_ID_COLUMN);
    let count = quote_identifier(COUNT_COLUMN);
    let status = quote_identifier(STATUS_COLUMN);

    let mut sql = format!(
        "SELECT e.{id}, COALESCE(l.{count}, 0) AS {locations}, \
         COALESCE(m.{count}, 0) AS {employees} \
         FROM {entity} AS e \
         LEFT JOIN ({location_counts}) AS l ON l.{id} = e.{id} \
         LEFT JOIN ({employee_counts}) AS m ON m.{id} = e.{id} \
         WHERE ",
        locations = quote_identifier(ACTIVE_LOCATIONS_COLUMN),
        employees = quote_identifier(ACTIVE_EMPLOYEES_COLUMN),
        entity = quote_identifier(ENTITY_TABLE),
        location_counts = active_count_subquery(ENTITY_LOCATION.name),
        employee_counts = active_count_subquery(ENTITY_EMPLOYEE.name),
    );

    if excluded_status_count > 0 {
        let _ = write!(
            sql,
            "(e.{status} IS NULL OR e.{status} NOT IN ({})) AND ",
            placeholders(excluded_status_count)
        );
    }

    let _ = write!(
        sql,
        "COALESCE(l.{count}, 0) <= ? AND COALESCE(m.{count}, 0) < ?"
    );

    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::find_table;

    #[test]
    fn scoped_direct_query_filters_on_entity_id() {
        let query = SourceQuery::scoped(&ENTITY_EMPLOYEE, EntityId::new(416));

        assert_eq!(
            query.sql(),
            "SELECT * FROM `EntityEmployee` WHERE `entityId` = ?"
        );
        assert_eq!(query.params(), vec![QueryParam::UInt(416)]);
        assert_eq!(query.table_name(), "EntityEmployee");
    }

    #[test]
    fn scoped_query_over_many_ids_uses_in_list() {
        let query = SourceQuery::ScopedRows {
            table: &ENTITY_LOCATION,
            entity_ids: vec![EntityId::new(1), EntityId::new(2), EntityId::new(3)],
        };

        assert_eq!(
            query.sql(),
            "SELECT * FROM `EntityLocation` WHERE `entityId` IN (?, ?, ?)"
        );
        assert_eq!(query.params().len(), 3);
    }

    #[test]
    fn third_level_query_joins_through_parent() {
        let table = find_table("EntityEmployeeAchievementHistory").unwrap();
        let query = SourceQuery::scoped(table, EntityId::new(9));

        assert_eq!(
            query.sql(),
            "SELECT c.* FROM `EntityEmployeeAchievementHistory` AS c \
             INNER JOIN `EntityEmployee` AS p ON p.`entityEmployeeId` = c.`entityEmployeeId` \
             WHERE p.`entityId` = ?"
        );
    }

    #[test]
    fn count_query_optionally_filters_active_rows() {
        let active = SourceQuery::CountByEntity {
            table: "EntityEmployee",
            active_only: true,
        };
        let all = SourceQuery::CountByEntity {
            table: "Customer",
            active_only: false,
        };

        assert_eq!(
            active.sql(),
            "SELECT `entityId`, COUNT(*) AS `total` FROM `EntityEmployee` \
             WHERE `active` = 1 GROUP BY `entityId`"
        );
        assert_eq!(
            all.sql(),
            "SELECT `entityId`, COUNT(*) AS `total` FROM `Customer` GROUP BY `entityId`"
        );
        assert!(all.params().is_empty());
    }

    #[test]
    fn simple_shop_query_binds_statuses_then_limits() {
        let query = SourceQuery::SimpleShopCandidates {
            max_active_locations: 2,
            max_active_employees_exclusive: 5,
            excluded_statuses: vec!["Cancelled".to_string(), "On Hold".to_string()],
        };

        let sql = query.sql();
        assert!(sql.contains("NOT IN (?, ?)"));
        assert!(sql.ends_with("COALESCE(l.`total`, 0) <= ? AND COALESCE(m.`total`, 0) < ?"));
        assert_eq!(
            query.params(),
            vec![
                QueryParam::Text("Cancelled".to_string()),
                QueryParam::Text("On Hold".to_string()),
                QueryParam::UInt(2),
                QueryParam::UInt(5),
            ]
        );
    }

    #[test]
    fn simple_shop_query_without_exclusions_skips_status_filter() {
        let query = SourceQuery::SimpleShopCandidates {
            max_active_locations: 2,
            max_active_employees_exclusive: 5,
            excluded_statuses: vec![],
        };

        assert!(!query.sql().contains("NOT IN"));
        assert_eq!(query.params().len(), 2);
    }

    #[test]
    fn identifiers_escape_backticks() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
