//! Observability setup for Teledrive: structured logging via `tracing`,
//! optionally bridged to OpenTelemetry.

pub mod tracing_setup;
