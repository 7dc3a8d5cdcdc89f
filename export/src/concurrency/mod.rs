//! Resource control for long export runs.
//!
//! The pipeline drives entities one at a time and fans out table loads within an entity.
//! The [`governor`] bounds how many entities' rows stay cached across the batch.

pub mod governor;
