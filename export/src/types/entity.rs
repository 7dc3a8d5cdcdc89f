use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, ExportResult};

/// A single source row, keyed by column name.
///
/// Column order follows the order in which the source returned them.
pub type Row = serde_json::Map<String, Value>;

/// Column holding the tenant identifier on `Entity` and every second-level table.
pub const ENTITY_ID_COLUMN: &str = "entityId";

/// Identifier of a root `Entity` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }

    /// Reads an identifier out of a JSON value.
    ///
    /// Unsigned integers are accepted as is, and strings are accepted when they hold a
    /// base-10 unsigned integer. Anything else yields [`None`].
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().map(Self),
            Value::String(text) => text.trim().parse().ok().map(Self),
            _ => None,
        }
    }

    /// Reads the identifier stored in `column` of `row`.
    pub fn from_row(row: &Row, column: &str) -> Option<Self> {
        row.get(column).and_then(Self::from_value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<EntityId> for u64 {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

impl FromStr for EntityId {
    type Err = ExportError;

    fn from_str(s: &str) -> ExportResult<Self> {
        Ok(Self(s.parse::<u64>()?))
    }
}
