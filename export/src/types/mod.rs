//! Common types used throughout the exporter.

mod entity;

pub use entity::*;
