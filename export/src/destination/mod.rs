//! Persistence of exported entities and the global index.

mod base;
pub mod filesystem;
mod index;
pub mod memory;

pub use base::{ENTITY_FILE, INDEX_FILE, OutputWriter, STATISTICS_FILE};
pub use index::{IndexDocument, IndexEntry};
