//! Observability setup shared by the CLI and the API server.

pub mod tracing_setup;
