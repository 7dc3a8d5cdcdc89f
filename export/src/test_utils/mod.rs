//! Utilities for testing export runs without a database.
//!
//! [`memory_source::MemorySource`] evaluates source queries against in-memory tables and can
//! inject failures per table. [`fixtures`] builds realistic tenants on top of it, and
//! [`recording_downstream`] captures what the pipeline hands to downstream collaborators.
//! Combine them with [`crate::destination::memory::MemoryOutputWriter`] to run a whole
//! pipeline in memory.

pub mod fixtures;
pub mod memory_source;
pub mod recording_downstream;
