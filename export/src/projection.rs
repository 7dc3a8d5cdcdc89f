//! The flat per-entity projection written next to the category files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bail;
use crate::classify::{LocationAddresses, ResolvedAddresses, SimpleShopInfo};
use crate::conversions::value::{STATUS_COLUMN, is_active_entity, non_empty_str};
use crate::error::{ErrorKind, ExportResult};
use crate::statistics::BasicStatistics;
use crate::types::{ENTITY_ID_COLUMN, EntityId, Row};

/// Column holding the display name of an entity.
pub const NAME_COLUMN: &str = "name";

/// How much of an entity has been exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    /// Projection and empty category shells only.
    Basic,
    /// All seven categories populated.
    Full,
}

/// Flat summary of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProjection {
    pub entity_id: EntityId,
    pub name: String,
    pub status: Option<String>,
    pub active: bool,
    pub addresses: ResolvedAddresses,
    /// Addresses referenced by the entity's locations, when those were loaded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location_addresses: Vec<LocationAddresses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<BasicStatistics>,
    #[serde(flatten)]
    pub simple_shop: Option<SimpleShopInfo>,
    pub processing_level: ProcessingLevel,
    pub export_timestamp: DateTime<Utc>,
    /// Every column of the root row.
    pub fields: Row,
}

impl EntityProjection {
    /// Builds a projection from a validated root row.
    pub fn new(
        entity: &ValidatedEntity,
        addresses: ResolvedAddresses,
        processing_level: ProcessingLevel,
    ) -> Self {
        let status = match entity.row.get(STATUS_COLUMN) {
            Some(serde_json::Value::String(status)) => Some(status.clone()),
            _ => None,
        };

        Self {
            entity_id: entity.entity_id,
            name: entity.name.clone(),
            status,
            active: is_active_entity(&entity.row),
            addresses,
            location_addresses: Vec::new(),
            statistics: None,
            simple_shop: None,
            processing_level,
            export_timestamp: Utc::now(),
            fields: entity.row.clone(),
        }
    }

    pub fn with_statistics(mut self, statistics: BasicStatistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_location_addresses(mut self, location_addresses: Vec<LocationAddresses>) -> Self {
        self.location_addresses = location_addresses;
        self
    }

    pub fn with_simple_shop(mut self, info: Option<SimpleShopInfo>) -> Self {
        self.simple_shop = info;
        self
    }
}

/// A root row that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntity {
    pub entity_id: EntityId,
    pub name: String,
    pub row: Row,
}

impl ValidatedEntity {
    /// Checks that `entityId` is numeric and `name` is non-empty.
    pub fn validate(row: Row) -> ExportResult<Self> {
        let Some(entity_id) = row.get(ENTITY_ID_COLUMN).and_then(EntityId::from_value) else {
            bail!(
                ErrorKind::ValidationError,
                "Entity row has no numeric entityId",
                format!("{:?}", row.get(ENTITY_ID_COLUMN))
            );
        };

        let Some(name) = non_empty_str(&row, NAME_COLUMN).map(str::to_string) else {
            bail!(
                ErrorKind::ValidationError,
                "Entity row has an empty name",
                format!("entity {entity_id}")
            );
        };

        Ok(Self {
            entity_id,
            name,
            row,
        })
    }

    pub fn is_active(&self) -> bool {
        is_active_entity(&self.row)
    }
}
