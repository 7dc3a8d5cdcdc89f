//! The seven category payloads assembled for every entity.

mod assembler;
mod catalog;

pub use assembler::{CategoryAssembler, CategoryMetadata, CategoryPayload, EntityExport};
pub use catalog::*;
