use tracing::info;

use crate::cache::EntityCache;

/// Empties every cache after a fixed number of fully processed entities.
///
/// Per-entity eviction already runs after each entity, failed or not. The governor only
/// counts entities whose full export succeeded, and additionally clears rows that were
/// preloaded or loaded for other entities.
#[derive(Debug)]
pub struct MemoryGovernor {
    interval: usize,
    finished: usize,
    global_evictions: usize,
}

impl MemoryGovernor {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            finished: 0,
            global_evictions: 0,
        }
    }

    /// Records an entity whose full export succeeded.
    ///
    /// Returns `true` when this call triggered a global eviction.
    pub async fn entity_finished(&mut self, cache: &EntityCache) -> bool {
        self.finished += 1;

        if self.finished % self.interval != 0 {
            return false;
        }

        let evicted = cache.evict_all().await;
        self.global_evictions += 1;

        info!(
            finished = self.finished,
            evicted_entries = evicted,
            "global cache eviction"
        );

        true
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    pub fn global_evictions(&self) -> usize {
        self.global_evictions
    }
}
