//! Collaborators that consume an entity after its data has been persisted.

mod base;
pub mod mirror;

pub use base::{Downstream, DownstreamScope, NoopDownstream, NoopRemoteSync, RemoteSync};
pub use mirror::DirectoryMirrorSync;
