//! Market Data Acquisition Engine
//!
//! Multi-symbol ticker retrieval with greeks self-healing, single-symbol
//! stabilizing snapshots, historical bars and delta-filtered option tickers.

use std::sync::Arc;

use chrono::Utc;

use super::session::{GatewaySession, GatewaySessionManager};
use super::stabilization::{StabilizationPolicy, stabilize};
use crate::application::ports::{
    CommandChannel, ExchangeCalendar, GatewayCommand, TradingApi, TradingApiConnector,
};
use crate::domain::market_data::{
    BarData, Contract, ContractQuery, DeltaCriteria, HistoricalDataRequest, MarketDataType,
    SnapshotRequest, TickData, TickerSnapshot, greeks_missing,
};
use crate::error::GatewayError;
use crate::infrastructure::config::MarketDataSettings;
use crate::infrastructure::metrics;

/// Market data acquisition over the shared gateway session.
pub struct MarketDataEngine<K: TradingApiConnector, C: CommandChannel, M: ExchangeCalendar> {
    sessions: Arc<GatewaySessionManager<K>>,
    commands: Arc<C>,
    calendar: Arc<M>,
    settings: MarketDataSettings,
}

impl<K, C, M> MarketDataEngine<K, C, M>
where
    K: TradingApiConnector,
    C: CommandChannel,
    M: ExchangeCalendar,
{
    /// Create an engine.
    #[must_use]
    pub const fn new(
        sessions: Arc<GatewaySessionManager<K>>,
        commands: Arc<C>,
        calendar: Arc<M>,
        settings: MarketDataSettings,
    ) -> Self {
        Self {
            sessions,
            commands,
            calendar,
            settings,
        }
    }

    fn market_open(&self, exchange: &str) -> bool {
        let exchange = if exchange.is_empty() {
            self.settings.calendar_exchange.as_str()
        } else {
            exchange
        };
        self.calendar.is_trading_minute(exchange, Utc::now())
    }

    // =========================================================================
    // Ticker Batches
    // =========================================================================

    /// Ticker snapshots for a set of contract ids.
    ///
    /// If the batch holds option contracts and none of them received greeks,
    /// the gateway is restarted and the batch fetched again, up to the
    /// configured number of rounds. Still-missing greeks after that are a
    /// warning, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the session, a request or the restart command fails.
    #[tracing::instrument(skip(self), fields(count = contract_ids.len()))]
    pub async fn get_tickers(
        &self,
        contract_ids: &[i64],
    ) -> Result<Vec<TickerSnapshot>, GatewayError> {
        if contract_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self.sessions.ensure_connected().await?;
        let contracts = qualify_ids(&session, contract_ids).await?;

        let mut snapshots = self.fetch_tickers(&session, &contracts).await?;
        let mut attempt = 0;
        while greeks_missing(&snapshots) && attempt < self.settings.max_self_heal_attempts {
            attempt += 1;
            tracing::warn!(attempt, "No greeks data for option contracts, restarting gateway");
            self.commands.send(GatewayCommand::Restart.as_str()).await?;
            metrics::record_self_heal_restart();

            tokio::time::sleep(self.settings.restart_cooldown).await;
            session = self.sessions.ensure_connected().await?;
            snapshots = self.fetch_tickers(&session, &contracts).await?;
        }

        if greeks_missing(&snapshots) {
            tracing::warn!(
                restarts = attempt,
                "Still no greeks data for option contracts, returning tickers without greeks"
            );
        }

        Ok(snapshots)
    }

    async fn fetch_tickers(
        &self,
        session: &GatewaySession<K::Api>,
        contracts: &[Contract],
    ) -> Result<Vec<TickerSnapshot>, GatewayError> {
        let open = self.market_open(&self.settings.calendar_exchange);
        let data_type = MarketDataType::for_ticker_batch(open);
        tracing::debug!(market_open = open, ?data_type, "Requesting ticker batch");

        session.set_market_data_type(data_type).await?;
        let tickers = session.request_tickers(contracts).await?;

        let now = Utc::now();
        Ok(tickers
            .iter()
            .map(|ticker| TickerSnapshot::from_ticker(ticker, data_type, now))
            .collect())
    }

    /// Ticker snapshots whose delta lies within `criteria`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying ticker retrieval fails.
    pub async fn get_filtered_option_tickers(
        &self,
        contract_ids: &[i64],
        criteria: DeltaCriteria,
    ) -> Result<Vec<TickerSnapshot>, GatewayError> {
        let snapshots = self.get_tickers(contract_ids).await?;
        let filtered: Vec<_> = snapshots
            .into_iter()
            .filter(|snapshot| criteria.matches(snapshot))
            .collect();

        if filtered.is_empty() {
            tracing::warn!(?criteria, "No options found matching the criteria");
        }
        Ok(filtered)
    }

    // =========================================================================
    // Single-Symbol Snapshot
    // =========================================================================

    /// Sanitized snapshot for one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DataUnavailable`] if no timestamped value
    /// arrived before the wait gave up, or an error if the session or a
    /// request fails.
    #[tracing::instrument(skip(self, request), fields(symbol = %request.symbol, class = request.class.as_str()))]
    pub async fn get_market_data_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<TickData, GatewayError> {
        if request.symbol.trim().is_empty() && request.con_id.is_none() {
            return Err(GatewayError::InvalidRequest(
                "symbol or contract id is required".to_string(),
            ));
        }

        let session = self.sessions.ensure_connected().await?;
        let contract = qualify_one(&session, request.query()).await?;

        let open = self.market_open(contract.calendar_exchange());
        let data_type = MarketDataType::for_snapshot(request.class, open);
        tracing::debug!(market_open = open, ?data_type, con_id = contract.con_id, "Requesting snapshot");

        session.set_market_data_type(data_type).await?;
        let mut updates = session.request_snapshot(&contract).await?;

        let policy = StabilizationPolicy::new(
            self.settings.stabilization_interval,
            self.settings.snapshot_timeout,
        );
        let result = stabilize(&mut updates, policy).await;

        result.tick.map_or_else(
            || {
                tracing::warn!("No market data received for snapshot");
                Err(GatewayError::no_market_data(&request.symbol, request.class))
            },
            |tick| {
                Ok(TickData::sanitized(
                    &request.symbol,
                    Some(contract.con_id),
                    &tick,
                    Utc::now(),
                ))
            },
        )
    }

    // =========================================================================
    // Historical Bars
    // =========================================================================

    /// Historical bars for a contract.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ContractNotFound`] if the contract cannot be
    /// qualified, or an error if the session or the request fails.
    pub async fn get_historical_data(
        &self,
        request: HistoricalDataRequest,
    ) -> Result<Vec<BarData>, GatewayError> {
        let request = request.normalized();
        if request.symbol.is_empty() {
            return Err(GatewayError::InvalidRequest("symbol is required".to_string()));
        }

        let session = self.sessions.ensure_connected().await?;
        let contract = qualify_one(&session, request.query()).await?;

        let bars = session.historical_bars(&contract, &request).await?;
        if bars.is_empty() {
            tracing::warn!(symbol = %contract.symbol, sec_type = %contract.sec_type, "No historical data returned");
        } else {
            tracing::debug!(symbol = %contract.symbol, bars = bars.len(), "Received historical data");
        }

        Ok(bars.into_iter().map(BarData::from).collect())
    }
}

async fn qualify_ids<A: TradingApi>(
    session: &GatewaySession<A>,
    contract_ids: &[i64],
) -> Result<Vec<Contract>, GatewayError> {
    let queries: Vec<_> = contract_ids.iter().copied().map(ContractQuery::by_id).collect();
    let qualified = session.qualify(&queries).await?;

    Ok(qualified
        .into_iter()
        .zip(contract_ids)
        .filter_map(|(contract, id)| {
            if contract.is_none() {
                tracing::warn!(con_id = id, "Contract could not be qualified, skipping");
            }
            contract
        })
        .collect())
}

async fn qualify_one<A: TradingApi>(
    session: &GatewaySession<A>,
    query: ContractQuery,
) -> Result<Contract, GatewayError> {
    session
        .qualify(std::slice::from_ref(&query))
        .await?
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| GatewayError::ContractNotFound(query.describe()))
}
