//! Configuration types and loading for the entity export pipeline.
//!
//! Configuration is read from `configuration/base.*` and `configuration/{environment}.*`
//! and then overridden by `APP_`-prefixed environment variables.

pub mod environment;
mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};
