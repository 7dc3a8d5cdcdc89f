//! Shared configuration types for export runs.

mod base;
mod classification;
mod connection;
mod export;
mod mode;
mod output;
mod preload;

pub use base::ValidationError;
pub use classification::SimpleShopConfig;
pub use connection::{
    EXPORT_SOURCE_OPTIONS, IntoConnectOptions, SourceConnectionConfig,
    SourceConnectionConfigWithoutSecrets, SourceSessionOptions, TlsConfig,
};
pub use export::ExportConfig;
pub use mode::{ParseProcessingModeError, ProcessingMode, SkipEntry};
pub use output::{OutputConfig, RemoteSyncConfig};
pub use preload::{MemoryConfig, PreloadConfig, ScanConfig};
