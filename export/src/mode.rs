//! Selection of the entities that receive the full export.

use export_config::shared::{ExportConfig, ProcessingMode, SkipEntry};
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

use crate::types::EntityId;

/// Resolves which entities are fully processed in a run.
///
/// Precedence is strict: an explicit target replaces automatic selection, full mode selects
/// every Active entity and demo mode selects every Simple Shop. The skip-list and the
/// fully-processed markers only filter automatic selection, so an Active target is exported
/// again even when a previous run completed it.
#[derive(Debug, Clone)]
pub struct ModeSelector<'a> {
    mode: ProcessingMode,
    target: Option<EntityId>,
    skip_list: &'a [SkipEntry],
}

impl<'a> ModeSelector<'a> {
    pub fn new(mode: ProcessingMode, target: Option<EntityId>, skip_list: &'a [SkipEntry]) -> Self {
        Self {
            mode,
            target,
            skip_list,
        }
    }

    pub fn from_config(config: &'a ExportConfig) -> Self {
        Self::new(
            config.mode,
            config.target_entity_id.map(EntityId::new),
            &config.skip_list,
        )
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Returns the skip-list reason for an entity, if any.
    pub fn skip_reason(&self, entity_id: EntityId) -> Option<&'a str> {
        self.skip_list
            .iter()
            .find(|entry| entry.entity_id == entity_id.into_inner())
            .map(|entry| entry.reason.as_str())
    }

    /// Selects the full-processing set, in ascending ID order.
    ///
    /// Automatically selected entities found in `fully_processed` are left out.
    pub fn select(
        &self,
        active: &BTreeSet<EntityId>,
        simple_shops: &BTreeSet<EntityId>,
        fully_processed: &HashSet<EntityId>,
    ) -> Vec<EntityId> {
        match self.target {
            Some(target) if active.contains(&target) => {
                if let Some(reason) = self.skip_reason(target) {
                    info!(%target, reason, "target overrides skip-list entry");
                }
                if fully_processed.contains(&target) {
                    info!(%target, "target was already fully processed, exporting it again");
                }
                vec![target]
            }
            Some(target) => {
                warn!(%target, "target entity is not active, nothing selected");
                vec![]
            }
            None => {
                let pool = match self.mode {
                    ProcessingMode::Full => active,
                    ProcessingMode::Demo => simple_shops,
                };

                pool.iter()
                    .copied()
                    .filter(|entity_id| match self.skip_reason(*entity_id) {
                        Some(reason) => {
                            info!(%entity_id, reason, "entity skipped by skip-list");
                            false
                        }
                        None => true,
                    })
                    .filter(|entity_id| !fully_processed.contains(entity_id))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[u64]) -> BTreeSet<EntityId> {
        values.iter().copied().map(EntityId::new).collect()
    }

    fn skip(entity_id: u64) -> SkipEntry {
        SkipEntry {
            entity_id,
            reason: "internal test tenant".to_string(),
        }
    }

    #[test]
    fn full_mode_selects_active_minus_skip_list() {
        let skip_list = vec![skip(2)];
        let selector = ModeSelector::new(ProcessingMode::Full, None, &skip_list);

        let selected = selector.select(&ids(&[1, 2, 3]), &ids(&[3]), &HashSet::new());

        assert_eq!(selected, vec![EntityId::new(1), EntityId::new(3)]);
    }

    #[test]
    fn demo_mode_selects_simple_shops_minus_skip_list() {
        let skip_list = vec![skip(5)];
        let selector = ModeSelector::new(ProcessingMode::Demo, None, &skip_list);

        let selected = selector.select(&ids(&[1, 4, 5]), &ids(&[4, 5, 6]), &HashSet::new());

        assert_eq!(selected, vec![EntityId::new(4), EntityId::new(6)]);
    }

    #[test]
    fn active_target_overrides_skip_list() {
        let skip_list = vec![skip(9)];
        let selector = ModeSelector::new(ProcessingMode::Demo, Some(EntityId::new(9)), &skip_list);

        let selected = selector.select(&ids(&[9, 10]), &ids(&[10]), &HashSet::new());

        assert_eq!(selected, vec![EntityId::new(9)]);
        assert_eq!(selector.skip_reason(EntityId::new(9)), Some("internal test tenant"));
    }

    #[test]
    fn inactive_target_selects_nothing() {
        let selector = ModeSelector::new(ProcessingMode::Full, Some(EntityId::new(3)), &[]);

        assert!(selector.select(&ids(&[1]), &ids(&[]), &HashSet::new()).is_empty());
    }

    #[test]
    fn fully_processed_entities_are_removed() {
        let selector = ModeSelector::new(ProcessingMode::Full, None, &[]);
        let processed = HashSet::from([EntityId::new(1)]);

        let selected = selector.select(&ids(&[1, 2]), &ids(&[]), &processed);

        assert_eq!(selected, vec![EntityId::new(2)]);
    }

    #[test]
    fn fully_processed_target_is_selected_again() {
        let selector = ModeSelector::new(ProcessingMode::Full, Some(EntityId::new(1)), &[]);
        let processed = HashSet::from([EntityId::new(1)]);

        let selected = selector.select(&ids(&[1, 2]), &ids(&[]), &processed);

        assert_eq!(selected, vec![EntityId::new(1)]);
    }
}
