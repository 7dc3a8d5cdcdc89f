//! Per-entity statistics computed with one grouped count query per statistic.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::category::{
    ENTITY_COMPONENT, ENTITY_EMPLOYEE, ENTITY_INVOICE, ENTITY_LOCATION, ENTITY_PART,
};
use crate::source::{COUNT_COLUMN, Source, SourceQuery};
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};

/// Table holding the customers handled by the downstream customer processor.
pub const CUSTOMER_TABLE: &str = "Customer";

/// Table holding the service orders handled by the downstream service-order processor.
pub const SERVICE_ORDER_TABLE: &str = "ServiceOrder";

/// Counts attached to every entity during the basic pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStatistics {
    pub active_employees: u64,
    pub active_locations: u64,
    pub invoices: u64,
    pub parts: u64,
    pub components: u64,
    pub customers: u64,
    pub service_orders: u64,
}

#[derive(Debug, Clone, Copy)]
enum Statistic {
    ActiveEmployees,
    ActiveLocations,
    Invoices,
    Parts,
    Components,
    Customers,
    ServiceOrders,
}

impl Statistic {
    const ALL: [Statistic; 7] = [
        Statistic::ActiveEmployees,
        Statistic::ActiveLocations,
        Statistic::Invoices,
        Statistic::Parts,
        Statistic::Components,
        Statistic::Customers,
        Statistic::ServiceOrders,
    ];

    fn query(&self) -> SourceQuery {
        let (table, active_only) = match self {
            Statistic::ActiveEmployees => (ENTITY_EMPLOYEE.name, true),
            Statistic::ActiveLocations => (ENTITY_LOCATION.name, true),
            Statistic::Invoices => (ENTITY_INVOICE.name, false),
            Statistic::Parts => (ENTITY_PART.name, false),
            Statistic::Components => (ENTITY_COMPONENT.name, false),
            Statistic::Customers => (CUSTOMER_TABLE, false),
            Statistic::ServiceOrders => (SERVICE_ORDER_TABLE, false),
        };

        SourceQuery::CountByEntity { table, active_only }
    }

    fn slot<'a>(&self, statistics: &'a mut BasicStatistics) -> &'a mut u64 {
        match self {
            Statistic::ActiveEmployees => &mut statistics.active_employees,
            Statistic::ActiveLocations => &mut statistics.active_locations,
            Statistic::Invoices => &mut statistics.invoices,
            Statistic::Parts => &mut statistics.parts,
            Statistic::Components => &mut statistics.components,
            Statistic::Customers => &mut statistics.customers,
            Statistic::ServiceOrders => &mut statistics.service_orders,
        }
    }
}

/// Statistics for every entity, computed once per run.
#[derive(Debug, Clone, Default)]
pub struct StatisticsIndex {
    by_entity: HashMap<EntityId, BasicStatistics>,
    failed_queries: usize,
}

impl StatisticsIndex {
    /// Runs every count query concurrently.
    ///
    /// A failed query is logged and its statistic stays at zero for every entity.
    pub async fn load<S>(source: &S) -> Self
    where
        S: Source,
    {
        let queries: Vec<(Statistic, SourceQuery)> = Statistic::ALL
            .into_iter()
            .map(|statistic| (statistic, statistic.query()))
            .collect();
        let results = join_all(queries.iter().map(|(_, query)| source.query(query))).await;

        let mut index = StatisticsIndex::default();
        for ((statistic, query), result) in queries.iter().zip(results) {
            let rows = match result {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(
                        table = query.table_name(),
                        error = %err,
                        "statistics query failed, reporting zero"
                    );
                    index.failed_queries += 1;
                    continue;
                }
            };

            for row in &rows {
                if let Some(entity_id) = EntityId::from_row(row, ENTITY_ID_COLUMN) {
                    let entry = index.by_entity.entry(entity_id).or_default();
                    *statistic.slot(entry) = count_of(row);
                }
            }
        }

        debug!(
            entities = index.by_entity.len(),
            failed_queries = index.failed_queries,
            "statistics loaded"
        );

        index
    }

    /// Statistics of one entity; entities without rows report zeros.
    pub fn get(&self, entity_id: EntityId) -> BasicStatistics {
        self.by_entity.get(&entity_id).copied().unwrap_or_default()
    }

    pub fn failed_queries(&self) -> usize {
        self.failed_queries
    }
}

fn count_of(row: &Row) -> u64 {
    match row.get(COUNT_COLUMN) {
        Some(Value::Number(number)) => number.as_u64().unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
