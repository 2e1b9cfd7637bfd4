//! Domain Layer - Gateway and market data types.
//!
//! Pure types and rules with no I/O: the gateway process state machine,
//! container status records, market data records and the vendor field-name
//! boundary.

/// Gateway process state and container status records.
pub mod gateway;

/// Contracts, tickers, snapshots and historical bars.
pub mod market_data;

/// camelCase to snake_case conversion for vendor records.
pub mod naming;
