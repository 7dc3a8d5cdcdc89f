//! Denormalizing exporter for multi-tenant relational data.
//!
//! Every tenant is a root `Entity` row owning rows in roughly one hundred and thirty dependent
//! tables. The [`pipeline::ExportPipeline`] turns each tenant into a directory of JSON files:
//! seven category payloads, a flat projection and basic statistics, plus a global index.
//!
//! A run is split in two passes. The basic pass writes a cheap export for every entity and
//! emits the index right away. The full pass then assembles every category for a selected
//! subset, chosen by [`mode::ModeSelector`]. Rows are read through a per-run
//! [`cache::EntityCache`] that the [`cache::BulkPreloader`] fills with one query per table
//! when the subset is small enough, and that the [`concurrency::governor::MemoryGovernor`]
//! empties periodically.
//!
//! Entities already marked fully processed in the index are skipped, so interrupted runs can
//! simply be restarted.

pub mod cache;
pub mod category;
pub mod classify;
pub mod concurrency;
pub mod conversions;
pub mod destination;
pub mod downstream;
pub mod error;
mod macros;
pub mod mode;
pub mod pipeline;
pub mod projection;
pub mod source;
pub mod statistics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
