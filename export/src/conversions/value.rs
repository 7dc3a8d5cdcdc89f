use serde_json::Value;

use crate::types::Row;

/// Column storing the lifecycle status of an entity.
pub const STATUS_COLUMN: &str = "status";

/// Column storing the active flag on entities and their dependent rows.
pub const ACTIVE_COLUMN: &str = "active";

/// Evaluates a value the way loosely typed consumers of the export do.
///
/// `null`, `false`, `0`, `NaN` and the empty string are falsy; everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Returns `true` when the row's `active` column is truthy.
pub fn is_active_row(row: &Row) -> bool {
    row.get(ACTIVE_COLUMN).is_some_and(is_truthy)
}

/// Returns `true` when an `Entity` row counts as Active.
///
/// A string `status` decides when present (`Active`, compared case-insensitively). Rows
/// without a status fall back to the `active` flag.
pub fn is_active_entity(row: &Row) -> bool {
    match row.get(STATUS_COLUMN) {
        Some(Value::String(status)) => status.trim().eq_ignore_ascii_case("active"),
        _ => is_active_row(row),
    }
}

/// Returns the column as a trimmed, non-empty string.
pub fn non_empty_str<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    match row.get(column) {
        Some(Value::String(text)) => {
            let text = text.trim();
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}
