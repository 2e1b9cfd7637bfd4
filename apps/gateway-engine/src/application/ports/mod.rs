//! Application Ports (Driven)
//!
//! Interfaces for the external collaborators: the container runtime, the
//! vendor trading-API client, the exchange calendar, the gateway command
//! server and the liveness probe.

mod command_port;
mod container_runtime_port;
mod trading_api_port;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use command_port::{CommandChannel, CommandError, GatewayCommand};
pub use container_runtime_port::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};
pub use trading_api_port::{
    ConnectRequest, TickerUpdates, TradingApi, TradingApiConnector, TradingApiError, VendorRecord,
};

#[cfg(test)]
pub use command_port::MockCommandChannel;
#[cfg(test)]
pub use container_runtime_port::MockContainerRuntime;

/// Exchange calendar lookup.
#[cfg_attr(test, mockall::automock)]
pub trait ExchangeCalendar: Send + Sync {
    /// Whether `at` falls in a trading minute of `exchange`.
    ///
    /// Implementations without a schedule for `exchange` answer with their
    /// default market's hours rather than failing.
    fn is_trading_minute(&self, exchange: &str, at: DateTime<Utc>) -> bool;
}

/// Liveness probe against the gateway's trading-API port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GatewayProbe: Send + Sync {
    /// Never fails; every failure is `false`.
    async fn probe(&self) -> bool;
}
