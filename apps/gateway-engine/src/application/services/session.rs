//! Gateway Session Manager
//!
//! Owns the single long-lived trading-API session. The session is opened
//! lazily, reused while it reports itself connected, and lent to callers as
//! a shared handle they cannot close.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Timelike, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::application::ports::{
    ConnectRequest, TradingApi, TradingApiConnector, TradingApiError,
};
use crate::domain::market_data::{
    Bar, Contract, ContractQuery, HistoricalDataRequest, MarketDataType, Ticker,
};
use crate::error::GatewayError;
use crate::infrastructure::config::SessionSettings;
use crate::infrastructure::metrics;

/// Client id derived from the time of day as `HHMMSS`.
#[must_use]
pub fn client_id_for(time: NaiveTime) -> i32 {
    (time.hour() * 10_000 + time.minute() * 100 + time.second()) as i32
}

// =============================================================================
// Session
// =============================================================================

/// Open trading-API session with a request timeout on every call.
pub struct GatewaySession<A: TradingApi> {
    api: A,
    client_id: i32,
    request_timeout: Duration,
}

impl<A: TradingApi> GatewaySession<A> {
    fn new(api: A, client_id: i32, request_timeout: Duration) -> Self {
        Self {
            api,
            client_id,
            request_timeout,
        }
    }

    /// Client id the session was opened with.
    #[must_use]
    pub const fn client_id(&self) -> i32 {
        self.client_id
    }

    /// Whether the underlying connection is alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.api.is_connected()
    }

    async fn call<T, F>(&self, operation: &str, future: F) -> Result<T, TradingApiError>
    where
        F: Future<Output = Result<T, TradingApiError>> + Send,
    {
        tokio::time::timeout(self.request_timeout, future)
            .await
            .map_err(|_| TradingApiError::Timeout(operation.to_string()))?
    }

    /// Qualify contract queries.
    ///
    /// The result is aligned with `queries`; entries the vendor could not
    /// qualify, or returned in an unusable shape, are `None`.
    pub async fn qualify(
        &self,
        queries: &[ContractQuery],
    ) -> Result<Vec<Option<Contract>>, TradingApiError> {
        let records = self
            .call("qualify contracts", self.api.qualify_contracts(queries))
            .await?;

        Ok(records
            .into_iter()
            .zip(queries)
            .map(|(record, query)| {
                let record = record?;
                Contract::from_vendor_record(record)
                    .map_err(|e| {
                        tracing::warn!(contract = %query.describe(), error = %e, "Malformed contract record");
                    })
                    .ok()
            })
            .collect())
    }

    /// Select the market data type for subsequent requests.
    pub async fn set_market_data_type(
        &self,
        data_type: MarketDataType,
    ) -> Result<(), TradingApiError> {
        self.call(
            "set market data type",
            self.api.set_market_data_type(data_type),
        )
        .await
    }

    /// Request a ticker batch.
    pub async fn request_tickers(
        &self,
        contracts: &[Contract],
    ) -> Result<Vec<Ticker>, TradingApiError> {
        self.call("request tickers", self.api.request_tickers(contracts))
            .await
    }

    /// Issue a one-shot snapshot request.
    pub async fn request_snapshot(&self, contract: &Contract) -> Result<A::Updates, TradingApiError> {
        self.call("request snapshot", self.api.request_snapshot(contract))
            .await
    }

    /// Request historical bars.
    pub async fn historical_bars(
        &self,
        contract: &Contract,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<Bar>, TradingApiError> {
        self.call(
            "request historical data",
            self.api.historical_bars(contract, request),
        )
        .await
    }

    /// Accounts managed by the logged-in user.
    pub async fn managed_accounts(&self) -> Result<Vec<String>, TradingApiError> {
        self.call("managed accounts", self.api.managed_accounts())
            .await
    }
}

// =============================================================================
// Session Manager
// =============================================================================

/// Connection details reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Whether the session is connected.
    pub connected: bool,
    /// Gateway host.
    pub host: String,
    /// Gateway trading-API port.
    pub port: u16,
    /// Client id of the current session.
    pub client_id: Option<i32>,
    /// Managed accounts; empty when unknown.
    pub accounts: Vec<String>,
}

/// Outcome of an explicit reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectOutcome {
    /// Whether a session is connected afterwards.
    pub success: bool,
    /// Human-readable result.
    pub message: String,
    /// Connection state afterwards.
    pub connected: bool,
}

/// Owner of the shared gateway session.
pub struct GatewaySessionManager<K: TradingApiConnector> {
    connector: Arc<K>,
    host: String,
    port: u16,
    settings: SessionSettings,
    reserved_client_id: i32,
    session: Mutex<Option<Arc<GatewaySession<K::Api>>>>,
}

impl<K: TradingApiConnector> GatewaySessionManager<K> {
    /// Create a manager for the gateway at `host:port`.
    ///
    /// `reserved_client_id` is never used for the long-lived session.
    #[must_use]
    pub fn new(
        connector: Arc<K>,
        host: impl Into<String>,
        port: u16,
        settings: SessionSettings,
        reserved_client_id: i32,
    ) -> Self {
        Self {
            connector,
            host: host.into(),
            port,
            settings,
            reserved_client_id,
            session: Mutex::new(None),
        }
    }

    fn next_client_id(&self) -> i32 {
        let client_id = client_id_for(Utc::now().time());
        if client_id == self.reserved_client_id {
            client_id + 1
        } else {
            client_id
        }
    }

    /// Return the connected session, opening a new one if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened. No retry is made.
    pub async fn ensure_connected(&self) -> Result<Arc<GatewaySession<K::Api>>, GatewayError> {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref()
            && session.is_connected()
        {
            return Ok(Arc::clone(session));
        }

        if let Some(stale) = slot.take() {
            tracing::debug!(client_id = stale.client_id, "Discarding disconnected session");
            stale.api.disconnect().await;
        }

        let request = ConnectRequest {
            host: self.host.clone(),
            port: self.port,
            client_id: self.next_client_id(),
            timeout: self.settings.connect_timeout,
            readonly: false,
        };

        let connected = tokio::time::timeout(request.timeout, self.connector.connect(&request))
            .await
            .unwrap_or_else(|_| {
                Err(TradingApiError::Timeout(format!(
                    "connect to {}:{}",
                    request.host, request.port
                )))
            });

        match connected {
            Ok(api) => {
                metrics::record_session_connect(true);
                tracing::info!(
                    host = %request.host,
                    port = request.port,
                    client_id = request.client_id,
                    "Connected to gateway"
                );
                let session = Arc::new(GatewaySession::new(
                    api,
                    request.client_id,
                    self.settings.request_timeout,
                ));
                *slot = Some(Arc::clone(&session));
                Ok(session)
            }
            Err(e) => {
                metrics::record_session_connect(false);
                tracing::error!(
                    host = %request.host,
                    port = request.port,
                    client_id = request.client_id,
                    error = %e,
                    "Failed to connect to gateway"
                );
                Err(e.into())
            }
        }
    }

    /// Current connection details. Never opens a session.
    pub async fn connection_status(&self) -> ConnectionStatus {
        let session = self.session.lock().await.clone();
        let mut status = ConnectionStatus {
            connected: false,
            host: self.host.clone(),
            port: self.port,
            client_id: None,
            accounts: Vec::new(),
        };

        if let Some(session) = session.filter(|s| s.is_connected()) {
            status.connected = true;
            status.client_id = Some(session.client_id);
            status.accounts = session.managed_accounts().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read managed accounts");
                Vec::new()
            });
        }
        status
    }

    /// Drop the current session and open a new one. Never fails.
    pub async fn reconnect(&self) -> ReconnectOutcome {
        self.close().await;
        tokio::time::sleep(self.settings.reconnect_pause).await;

        match self.ensure_connected().await {
            Ok(session) => ReconnectOutcome {
                success: true,
                message: format!("Reconnected with client id {}", session.client_id),
                connected: session.is_connected(),
            },
            Err(e) => ReconnectOutcome {
                success: false,
                message: format!("Reconnect failed: {e}"),
                connected: false,
            },
        }
    }

    /// Disconnect and forget the current session.
    pub async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            tracing::debug!(client_id = session.client_id, "Closing gateway session");
            session.api.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::ScriptedConnector;

    fn manager(connector: &Arc<ScriptedConnector>) -> GatewaySessionManager<ScriptedConnector> {
        GatewaySessionManager::new(
            Arc::clone(connector),
            "127.0.0.1",
            8888,
            SessionSettings::default(),
            1111,
        )
    }

    #[test]
    fn client_id_is_time_of_day() {
        let time = NaiveTime::from_hms_opt(10, 30, 45).unwrap();
        assert_eq!(client_id_for(time), 103_045);
        let time = NaiveTime::from_hms_opt(0, 0, 7).unwrap();
        assert_eq!(client_id_for(time), 7);
    }

    #[tokio::test]
    async fn session_is_opened_lazily_and_reused() {
        let connector = Arc::new(ScriptedConnector::new());
        let manager = manager(&connector);
        assert!(connector.connect_requests().is_empty());

        let first = manager.ensure_connected().await.unwrap();
        let second = manager.ensure_connected().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let requests = connector.connect_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].timeout, Duration::from_secs(20));
        assert!(!requests[0].readonly);
        assert_ne!(requests[0].client_id, 1111);
    }

    #[tokio::test]
    async fn dead_session_is_replaced() {
        let connector = Arc::new(ScriptedConnector::new());
        let manager = manager(&connector);

        manager.ensure_connected().await.unwrap();
        connector.drop_sessions();
        let session = manager.ensure_connected().await.unwrap();

        assert!(session.is_connected());
        assert_eq!(connector.connect_requests().len(), 2);
    }

    #[tokio::test]
    async fn connection_failure_propagates_without_retry() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.set_reachable(false);
        let manager = manager(&connector);

        let err = manager.ensure_connected().await.err().unwrap();

        assert_eq!(err.reason(), "CONNECTION_ERROR");
        assert_eq!(connector.connect_requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connect_times_out() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.set_connect_delay(Duration::from_secs(120));
        let manager = manager(&connector);

        let err = manager.ensure_connected().await.err().unwrap();

        assert!(matches!(
            err,
            GatewayError::Connection(TradingApiError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn status_without_session_does_not_connect() {
        let connector = Arc::new(ScriptedConnector::new());
        let manager = manager(&connector);

        let status = manager.connection_status().await;

        assert!(!status.connected);
        assert!(status.client_id.is_none());
        assert!(connector.connect_requests().is_empty());
    }

    #[tokio::test]
    async fn status_reports_accounts() {
        let connector = Arc::new(ScriptedConnector::new());
        connector.set_accounts(vec!["DU1234567".to_string()]);
        let manager = manager(&connector);
        manager.ensure_connected().await.unwrap();

        let status = manager.connection_status().await;

        assert!(status.connected);
        assert_eq!(status.accounts, vec!["DU1234567"]);
        assert_eq!(status.port, 8888);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_replaces_session() {
        let connector = Arc::new(ScriptedConnector::new());
        let manager = manager(&connector);
        manager.ensure_connected().await.unwrap();

        let outcome = manager.reconnect().await;

        assert!(outcome.success);
        assert!(outcome.connected);
        assert_eq!(connector.connect_requests().len(), 2);
        assert_eq!(connector.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_is_reported_not_raised() {
        let connector = Arc::new(ScriptedConnector::new());
        let manager = manager(&connector);
        manager.ensure_connected().await.unwrap();
        connector.set_reachable(false);

        let outcome = manager.reconnect().await;

        assert!(!outcome.success);
        assert!(!outcome.connected);
        assert!(outcome.message.contains("Reconnect failed"));
    }
}
