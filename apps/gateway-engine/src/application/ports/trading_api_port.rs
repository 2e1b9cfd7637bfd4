//! Trading API Port (Driven Port)
//!
//! Interface to the vendor trading-API client. The client is treated as an
//! opaque asynchronous RPC peer on a loopback socket.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::market_data::{
    Bar, Contract, ContractQuery, HistoricalDataRequest, MarketDataType, Ticker,
};

/// Vendor record with camelCase field names.
pub type VendorRecord = Map<String, Value>;

/// Parameters for opening a trading-API session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Gateway host.
    pub host: String,
    /// Gateway trading-API port.
    pub port: u16,
    /// Client identifier; must be unique among open sessions.
    pub client_id: i32,
    /// Connection timeout.
    pub timeout: Duration,
    /// Open the session read-only.
    pub readonly: bool,
}

/// Trading API errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TradingApiError {
    /// The session could not be opened.
    #[error("trading API connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation exceeded its timeout.
    #[error("trading API timeout: {0}")]
    Timeout(String),

    /// The peer rejected or failed a request.
    #[error("trading API request failed: {0}")]
    Request(String),

    /// The session is no longer connected.
    #[error("trading API session disconnected")]
    Disconnected,
}

/// Stream of updates for a one-shot snapshot request.
#[async_trait]
pub trait TickerUpdates: Send {
    /// Wait for the next update of the ticker.
    ///
    /// Returns `None` once the vendor will send no further updates.
    async fn next_update(&mut self) -> Option<Ticker>;
}

/// An open trading-API session.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Updates delivered for a snapshot request.
    type Updates: TickerUpdates + 'static;

    /// Whether the underlying connection is alive.
    fn is_connected(&self) -> bool;

    /// Close the session. Safe to call on a dead session.
    async fn disconnect(&self);

    /// Qualify partial contract descriptions.
    ///
    /// The result is aligned with `queries`; unqualified entries are `None`.
    async fn qualify_contracts(
        &self,
        queries: &[ContractQuery],
    ) -> Result<Vec<Option<VendorRecord>>, TradingApiError>;

    /// Select the market data type for subsequent requests.
    async fn set_market_data_type(&self, data_type: MarketDataType)
    -> Result<(), TradingApiError>;

    /// Request a ticker batch and wait for the vendor to fill it.
    async fn request_tickers(&self, contracts: &[Contract]) -> Result<Vec<Ticker>, TradingApiError>;

    /// Issue a one-shot snapshot request and return its update stream.
    async fn request_snapshot(&self, contract: &Contract) -> Result<Self::Updates, TradingApiError>;

    /// Request historical bars.
    async fn historical_bars(
        &self,
        contract: &Contract,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<Bar>, TradingApiError>;

    /// Accounts managed by the logged-in user.
    async fn managed_accounts(&self) -> Result<Vec<String>, TradingApiError>;
}

/// Factory that opens trading-API sessions.
#[async_trait]
pub trait TradingApiConnector: Send + Sync {
    /// Session type.
    type Api: TradingApi + 'static;

    /// Open a new session.
    async fn connect(&self, request: &ConnectRequest) -> Result<Self::Api, TradingApiError>;
}
