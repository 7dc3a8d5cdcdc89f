use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::projection::{EntityProjection, ProcessingLevel};
use crate::types::EntityId;

/// One entity as listed in the global index.
///
/// Deserializes from a persisted projection as well, in which case `fullyProcessed` is
/// `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub entity_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub processing_level: ProcessingLevel,
    #[serde(default)]
    pub is_simple_shop: bool,
    #[serde(default)]
    pub fully_processed: bool,
}

impl IndexEntry {
    pub fn from_projection(projection: &EntityProjection, fully_processed: bool) -> Self {
        Self {
            entity_id: projection.entity_id,
            name: projection.name.clone(),
            status: projection.status.clone(),
            active: projection.active,
            processing_level: projection.processing_level,
            is_simple_shop: projection
                .simple_shop
                .as_ref()
                .is_some_and(|info| info.is_simple_shop),
            fully_processed,
        }
    }
}

/// Content of the global index file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    pub generated_at: DateTime<Utc>,
    pub total_entities: usize,
    pub fully_processed_count: usize,
    pub entities: Vec<IndexEntry>,
}

impl IndexDocument {
    /// Builds a document with entries ordered by entity id.
    pub fn new(entries: BTreeMap<EntityId, IndexEntry>) -> Self {
        let entities: Vec<IndexEntry> = entries.into_values().collect();

        Self {
            generated_at: Utc::now(),
            total_entities: entities.len(),
            fully_processed_count: entities.iter().filter(|entry| entry.fully_processed).count(),
            entities,
        }
    }

    pub fn fully_processed(&self) -> HashSet<EntityId> {
        self.entities
            .iter()
            .filter(|entry| entry.fully_processed)
            .map(|entry| entry.entity_id)
            .collect()
    }

    /// Consumes the document into entries keyed by entity id.
    pub fn into_entries(self) -> BTreeMap<EntityId, IndexEntry> {
        self.entities
            .into_iter()
            .map(|entry| (entry.entity_id, entry))
            .collect()
    }
}
