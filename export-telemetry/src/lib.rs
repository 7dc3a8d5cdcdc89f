//! Telemetry setup shared by the exporter binaries and tests.

pub mod tracing;
