//! Application Layer - Services and port definitions.
//!
//! This layer holds the gateway lifecycle controller, the session manager
//! and the market data engine, written against the port interfaces that
//! the infrastructure layer implements.

/// Port interfaces for external systems (container runtime, vendor API, ...).
pub mod ports;

/// Lifecycle, session and market data services.
pub mod services;
