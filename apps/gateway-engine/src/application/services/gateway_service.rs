//! Gateway Service
//!
//! Facade owning the lifecycle controller, the session manager and the
//! market data engine for one gateway container. All collaborators are
//! injected so tests can substitute in-memory fakes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use super::lifecycle::GatewayLifecycle;
use super::market_data::MarketDataEngine;
use super::probe::SessionProbe;
use super::session::{ConnectionStatus, GatewaySessionManager, ReconnectOutcome};
use crate::application::ports::{
    CommandChannel, ContainerRuntime, ExchangeCalendar, GatewayCommand, TradingApiConnector,
};
use crate::domain::gateway::{ContainerStatus, GatewayLogs};
use crate::domain::market_data::{
    BarData, DeltaCriteria, HistoricalDataRequest, SnapshotRequest, TickData, TickerSnapshot,
};
use crate::error::GatewayError;
use crate::infrastructure::config::GatewayConfig;

/// Lifecycle controller used by the service.
pub type ServiceLifecycle<R, K> = GatewayLifecycle<R, SessionProbe<K>>;

/// Gateway engine facade.
pub struct GatewayService<R, C, K, M>
where
    R: ContainerRuntime,
    C: CommandChannel,
    K: TradingApiConnector,
    M: ExchangeCalendar,
{
    config: GatewayConfig,
    lifecycle: ServiceLifecycle<R, K>,
    sessions: Arc<GatewaySessionManager<K>>,
    market_data: MarketDataEngine<K, C, M>,
    commands: Arc<C>,
    shut_down: AtomicBool,
}

impl<R, C, K, M> GatewayService<R, C, K, M>
where
    R: ContainerRuntime,
    C: CommandChannel,
    K: TradingApiConnector,
    M: ExchangeCalendar,
{
    /// Wire the service from configuration and its collaborators.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        runtime: Arc<R>,
        connector: Arc<K>,
        commands: Arc<C>,
        calendar: Arc<M>,
    ) -> Self {
        let host = config.container.host.clone();
        let port = config.container.api_port;

        let probe = Arc::new(SessionProbe::new(
            Arc::clone(&connector),
            host.clone(),
            port,
            config.health.probe_client_id,
            config.health.probe_timeout,
        ));
        let lifecycle = GatewayLifecycle::new(
            runtime,
            probe,
            config.container_spec(),
            config.health.clone(),
            config.container.stop_timeout,
        );
        let sessions = Arc::new(GatewaySessionManager::new(
            connector,
            host,
            port,
            config.session.clone(),
            config.health.probe_client_id,
        ));
        let market_data = MarketDataEngine::new(
            Arc::clone(&sessions),
            Arc::clone(&commands),
            calendar,
            config.market_data.clone(),
        );

        Self {
            config,
            lifecycle,
            sessions,
            market_data,
            commands,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Configuration the service was built with.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Lifecycle controller.
    #[must_use]
    pub const fn lifecycle(&self) -> &ServiceLifecycle<R, K> {
        &self.lifecycle
    }

    /// Session manager.
    #[must_use]
    pub fn sessions(&self) -> &GatewaySessionManager<K> {
        &self.sessions
    }

    /// Market data engine.
    #[must_use]
    pub const fn market_data(&self) -> &MarketDataEngine<K, C, M> {
        &self.market_data
    }

    // =========================================================================
    // Container Lifecycle
    // =========================================================================

    /// Start or adopt the gateway container and wait until it answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the container runtime fails.
    pub async fn start_gateway(&self) -> Result<bool, GatewayError> {
        self.lifecycle.start().await
    }

    /// Stop and remove the gateway container unless `persist` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the container runtime fails.
    pub async fn stop_gateway(&self, persist: bool) -> Result<bool, GatewayError> {
        self.lifecycle.stop(persist).await
    }

    /// Container status with a health probe.
    pub async fn get_status(&self) -> ContainerStatus {
        self.lifecycle.get_status().await
    }

    /// Last `tail` lines of container output.
    pub async fn get_logs(&self, tail: usize) -> GatewayLogs {
        self.lifecycle.get_logs(tail).await
    }

    // =========================================================================
    // Market Data
    // =========================================================================

    /// Ticker snapshots for contract ids.
    ///
    /// # Errors
    ///
    /// See [`MarketDataEngine::get_tickers`].
    pub async fn get_tickers(
        &self,
        contract_ids: &[i64],
    ) -> Result<Vec<TickerSnapshot>, GatewayError> {
        self.market_data.get_tickers(contract_ids).await
    }

    /// Option tickers filtered by delta.
    ///
    /// # Errors
    ///
    /// See [`MarketDataEngine::get_filtered_option_tickers`].
    pub async fn get_filtered_option_tickers(
        &self,
        contract_ids: &[i64],
        criteria: DeltaCriteria,
    ) -> Result<Vec<TickerSnapshot>, GatewayError> {
        self.market_data
            .get_filtered_option_tickers(contract_ids, criteria)
            .await
    }

    /// Sanitized single-symbol snapshot.
    ///
    /// # Errors
    ///
    /// See [`MarketDataEngine::get_market_data_snapshot`].
    pub async fn get_market_data_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<TickData, GatewayError> {
        self.market_data.get_market_data_snapshot(request).await
    }

    /// Historical bars.
    ///
    /// # Errors
    ///
    /// See [`MarketDataEngine::get_historical_data`].
    pub async fn get_historical_data(
        &self,
        request: HistoricalDataRequest,
    ) -> Result<Vec<BarData>, GatewayError> {
        self.market_data.get_historical_data(request).await
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Current connection details.
    pub async fn connection_status(&self) -> ConnectionStatus {
        self.sessions.connection_status().await
    }

    /// Replace the session.
    pub async fn reconnect(&self) -> ReconnectOutcome {
        self.sessions.reconnect().await
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Send a command to the gateway command server.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be delivered.
    pub async fn send_command(&self, command: GatewayCommand) -> Result<(), GatewayError> {
        self.send_raw_command(command.as_str()).await
    }

    /// Send a free-form command line to the gateway command server.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is empty or cannot be delivered.
    pub async fn send_raw_command(&self, command: &str) -> Result<(), GatewayError> {
        self.commands.send(command).await.map_err(|e| {
            tracing::error!(command, error = %e, "Gateway command failed");
            GatewayError::from(e)
        })
    }

    // =========================================================================
    // Process Lifecycle
    // =========================================================================

    /// Start the gateway, serve until `shutdown` is cancelled, then shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway cannot be started.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), GatewayError> {
        match self.start_gateway().await {
            Ok(true) => tracing::info!("Gateway ready"),
            Ok(false) => tracing::warn!("Gateway started but did not become ready"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start gateway");
                self.shutdown().await;
                return Err(e);
            }
        }

        shutdown.cancelled().await;
        tracing::info!("Shutdown signal received");
        self.shutdown().await;
        Ok(())
    }

    /// Close the session and stop the container unless persisting.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.sessions.close().await;
        if let Err(e) = self.lifecycle.stop(self.config.persist).await {
            tracing::error!(error = %e, "Failed to stop gateway during shutdown");
        }
        tracing::info!(persist = self.config.persist, "Gateway service shut down");
    }
}

impl<R, C, K, M> Drop for GatewayService<R, C, K, M>
where
    R: ContainerRuntime,
    C: CommandChannel,
    K: TradingApiConnector,
    M: ExchangeCalendar,
{
    fn drop(&mut self) {
        if !self.shut_down.load(Ordering::SeqCst)
            && !self.config.persist
            && self.lifecycle.state().is_active()
        {
            tracing::warn!(
                container = self.lifecycle.container_name(),
                "Gateway service dropped without shutdown; container left running"
            );
        }
    }
}
