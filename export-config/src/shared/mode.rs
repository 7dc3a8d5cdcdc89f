use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Selects which entities receive the expensive full export.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Only Simple Shops are fully processed.
    #[default]
    Demo,
    /// Every Active entity is fully processed.
    Full,
}

impl ProcessingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::Demo => "demo",
            ProcessingMode::Full => "full",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no [`ProcessingMode`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown mode `{0}`, expected `demo` or `full`")]
pub struct ParseProcessingModeError(String);

/// Parses a mode name case-insensitively.
impl FromStr for ProcessingMode {
    type Err = ParseProcessingModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(ProcessingMode::Demo),
            "full" => Ok(ProcessingMode::Full),
            other => Err(ParseProcessingModeError(other.to_string())),
        }
    }
}

/// An entity excluded from automatic full processing.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SkipEntry {
    pub entity_id: u64,
    pub reason: String,
}
