//! Per-run caches of dependent rows and the bulk preloader that fills them.

mod entity;
mod preload;

pub use entity::{CacheStats, EntityCache};
pub use preload::{BulkPreloader, PreloadOutcome};
