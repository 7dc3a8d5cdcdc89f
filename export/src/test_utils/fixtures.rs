use export_config::shared::{
    ExportConfig, MemoryConfig, OutputConfig, PreloadConfig, ProcessingMode, ScanConfig,
    SimpleShopConfig, SourceConnectionConfig, TlsConfig,
};
use serde_json::{Value, json};
use std::path::Path;

use crate::category::{ENTITY_EMPLOYEE, ENTITY_LOCATION, ENTITY_TABLE};
use crate::test_utils::memory_source::MemorySource;
use crate::types::{ENTITY_ID_COLUMN, Row};

/// Converts a JSON object literal into a [`Row`].
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        other => panic!("fixture rows must be JSON objects, got {other}"),
    }
}

/// Builds the root row and dependent rows of one tenant.
#[derive(Debug, Clone)]
pub struct EntityFixture {
    entity_id: u64,
    entity: Row,
    locations: Vec<Row>,
    employees: Vec<Row>,
    extra: Vec<(&'static str, Row)>,
}

impl EntityFixture {
    /// Starts an Active entity named `Shop <id>`.
    pub fn new(entity_id: u64) -> Self {
        Self {
            entity_id,
            entity: row(json!({
                "entityId": entity_id,
                "name": format!("Shop {entity_id}"),
                "status": "Active",
            })),
            locations: Vec::new(),
            employees: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.entity.insert("name".to_string(), json!(name));
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.entity.insert("status".to_string(), json!(status));
        self
    }

    /// Sets an arbitrary column on the root row.
    pub fn field(mut self, column: &str, value: Value) -> Self {
        self.entity.insert(column.to_string(), value);
        self
    }

    /// Adds a location with an optional title.
    pub fn location(mut self, title: Option<&str>, active: bool) -> Self {
        let location_id = self.entity_id * 1000 + self.locations.len() as u64 + 1;
        let mut location = row(json!({
            "entityLocationId": location_id,
            "entityId": self.entity_id,
            "active": i32::from(active),
        }));
        if let Some(title) = title {
            location.insert("title".to_string(), json!(title));
        }

        self.locations.push(location);
        self
    }

    /// Adds an employee with an optional name.
    pub fn employee(mut self, name: Option<&str>, active: bool) -> Self {
        let employee_id = self.entity_id * 1000 + self.employees.len() as u64 + 1;
        let mut employee = row(json!({
            "entityEmployeeId": employee_id,
            "entityId": self.entity_id,
            "active": i32::from(active),
        }));
        if let Some(name) = name {
            employee.insert("name".to_string(), json!(name));
        }

        self.employees.push(employee);
        self
    }

    /// Adds `count` active, unnamed employees.
    pub fn employees(self, count: usize) -> Self {
        (0..count).fold(self, |fixture, _| fixture.employee(None, true))
    }

    /// Adds a row to a dependent table, filling in `entityId` when missing.
    pub fn dependent(mut self, table: &'static str, fields: Value) -> Self {
        let mut dependent = row(fields);
        dependent
            .entry(ENTITY_ID_COLUMN)
            .or_insert_with(|| json!(self.entity_id));

        self.extra.push((table, dependent));
        self
    }

    /// Adds a row to a third-level table, which has no `entityId` column.
    pub fn child(mut self, table: &'static str, fields: Value) -> Self {
        self.extra.push((table, row(fields)));
        self
    }

    pub fn entity_row(&self) -> Row {
        self.entity.clone()
    }

    /// Inserts every row of the fixture into `source`.
    pub async fn insert(self, source: &MemorySource) {
        source.insert_rows(ENTITY_TABLE, vec![self.entity]).await;
        source
            .insert_rows(ENTITY_LOCATION.name, self.locations)
            .await;
        source
            .insert_rows(ENTITY_EMPLOYEE.name, self.employees)
            .await;

        for (table, dependent) in self.extra {
            source.insert_rows(table, vec![dependent]).await;
        }
    }
}

/// Returns a configuration suitable for in-memory runs, writing below `root_dir`.
pub fn test_export_config(root_dir: &Path) -> ExportConfig {
    ExportConfig {
        source: SourceConnectionConfig {
            host: "localhost".to_string(),
            port: 3306,
            name: "export_test".to_string(),
            username: "export".to_string(),
            password: None,
            tls: TlsConfig::disabled(),
            max_connections: 1,
        },
        output: OutputConfig {
            root_dir: root_dir.to_path_buf(),
        },
        mode: ProcessingMode::Demo,
        target_entity_id: None,
        skip_list: Vec::new(),
        preload: PreloadConfig::default(),
        scan: ScanConfig::default(),
        memory: MemoryConfig::default(),
        simple_shop: SimpleShopConfig::default(),
        remote_sync: None,
    }
}
