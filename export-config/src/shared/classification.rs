use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Thresholds used by the Simple Shop aggregate query.
///
/// An entity is a Simple Shop when it has at most `max_active_locations` active locations,
/// fewer than `max_active_employees_exclusive` active employees, and a status outside of
/// `excluded_statuses`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SimpleShopConfig {
    #[serde(default = "default_max_active_locations")]
    pub max_active_locations: u64,
    #[serde(default = "default_max_active_employees_exclusive")]
    pub max_active_employees_exclusive: u64,
    #[serde(default = "default_excluded_statuses")]
    pub excluded_statuses: Vec<String>,
}

impl SimpleShopConfig {
    pub const DEFAULT_MAX_ACTIVE_LOCATIONS: u64 = 2;
    pub const DEFAULT_MAX_ACTIVE_EMPLOYEES_EXCLUSIVE: u64 = 5;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_active_employees_exclusive == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "simple_shop.max_active_employees_exclusive".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for SimpleShopConfig {
    fn default() -> Self {
        Self {
            max_active_locations: default_max_active_locations(),
            max_active_employees_exclusive: default_max_active_employees_exclusive(),
            excluded_statuses: default_excluded_statuses(),
        }
    }
}

fn default_max_active_locations() -> u64 {
    SimpleShopConfig::DEFAULT_MAX_ACTIVE_LOCATIONS
}

fn default_max_active_employees_exclusive() -> u64 {
    SimpleShopConfig::DEFAULT_MAX_ACTIVE_EMPLOYEES_EXCLUSIVE
}

fn default_excluded_statuses() -> Vec<String> {
    vec!["Cancelled".to_string(), "On Hold".to_string()]
}
