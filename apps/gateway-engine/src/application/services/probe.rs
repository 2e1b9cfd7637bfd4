//! Disposable liveness probe.
//!
//! Each probe opens its own throwaway session under a fixed client id so it
//! never collides with the long-lived gateway session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{ConnectRequest, GatewayProbe, TradingApi, TradingApiConnector};

/// Probe that connects, checks connectivity and always disconnects.
pub struct SessionProbe<K: TradingApiConnector> {
    connector: Arc<K>,
    request: ConnectRequest,
}

impl<K: TradingApiConnector> SessionProbe<K> {
    /// Create a probe against `host:port`.
    #[must_use]
    pub fn new(
        connector: Arc<K>,
        host: impl Into<String>,
        port: u16,
        client_id: i32,
        timeout: Duration,
    ) -> Self {
        Self {
            connector,
            request: ConnectRequest {
                host: host.into(),
                port,
                client_id,
                timeout,
                readonly: true,
            },
        }
    }
}

#[async_trait]
impl<K: TradingApiConnector> GatewayProbe for SessionProbe<K> {
    async fn probe(&self) -> bool {
        let connect = self.connector.connect(&self.request);
        let api = match tokio::time::timeout(self.request.timeout, connect).await {
            Ok(Ok(api)) => api,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Gateway probe connection failed");
                return false;
            }
            Err(_) => {
                tracing::debug!(
                    timeout_secs = self.request.timeout.as_secs(),
                    "Gateway probe timed out"
                );
                return false;
            }
        };

        let connected = api.is_connected();
        api.disconnect().await;
        connected
    }
}
