//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Exchange calendar (NYSE holidays and regular hours).
pub mod calendar;

/// Configuration from environment variables.
pub mod config;

/// Docker Engine container runtime adapter.
pub mod docker;

/// TCP client for the gateway's embedded command server.
pub mod ibc;

/// In-memory adapters for tests and dry runs.
pub mod memory;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
