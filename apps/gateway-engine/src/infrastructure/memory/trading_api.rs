//! Scripted trading-API client.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

use crate::application::ports::{
    ConnectRequest, TickerUpdates, TradingApi, TradingApiConnector, TradingApiError, VendorRecord,
};
use crate::domain::market_data::{
    Bar, Contract, ContractQuery, HistoricalDataRequest, MarketDataType, Ticker,
};

#[derive(Debug)]
struct Script {
    reachable: bool,
    sessions_alive: bool,
    connect_delay: Duration,
    connect_requests: Vec<ConnectRequest>,
    accounts: Vec<String>,
    contracts: Vec<VendorRecord>,
    tickers: HashMap<i64, Ticker>,
    withhold_greeks: usize,
    ticker_requests: usize,
    market_data_types: Vec<MarketDataType>,
    snapshot_script: Vec<(Duration, Ticker)>,
    hold_snapshots_open: bool,
    bars: Vec<Bar>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reachable: true,
            sessions_alive: true,
            connect_delay: Duration::ZERO,
            connect_requests: Vec::new(),
            accounts: Vec::new(),
            contracts: Vec::new(),
            tickers: HashMap::new(),
            withhold_greeks: 0,
            ticker_requests: 0,
            market_data_types: Vec::new(),
            snapshot_script: Vec::new(),
            hold_snapshots_open: false,
            bars: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    generation: AtomicU64,
    disconnects: AtomicUsize,
}

impl Shared {
    fn matches(record: &VendorRecord, query: &ContractQuery) -> bool {
        let field = |key: &str| record.get(key).and_then(Value::as_str);
        if let Some(con_id) = query.con_id {
            return record.get("conId").and_then(Value::as_i64) == Some(con_id);
        }
        let Some(symbol) = query.symbol.as_deref() else {
            return false;
        };
        field("symbol").is_some_and(|s| s.eq_ignore_ascii_case(symbol))
            && query
                .sec_type
                .as_ref()
                .is_none_or(|t| field("secType") == Some(t.code()))
            && query
                .currency
                .as_deref()
                .is_none_or(|c| field("currency").is_none_or(|rc| rc == c))
    }
}

/// Trading-API connector driven by a script instead of a live gateway.
///
/// Clones share the same script, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl ScriptedConnector {
    /// Reachable connector with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new connections when `false`.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.script.lock().reachable = reachable;
    }

    /// Open sessions report themselves disconnected when `false`.
    pub fn set_sessions_alive(&self, alive: bool) {
        self.shared.script.lock().sessions_alive = alive;
    }

    /// Delay every connection attempt.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.shared.script.lock().connect_delay = delay;
    }

    /// Drop every session opened so far, as a gateway restart would.
    pub fn drop_sessions(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Accounts reported by sessions.
    pub fn set_accounts(&self, accounts: Vec<String>) {
        self.shared.script.lock().accounts = accounts;
    }

    /// Register a contract record with camelCase field names.
    ///
    /// Non-object values are ignored.
    pub fn add_contract(&self, record: Value) {
        if let Value::Object(record) = record {
            self.shared.script.lock().contracts.push(record);
        }
    }

    /// Ticker state returned for `con_id`.
    pub fn set_ticker(&self, con_id: i64, ticker: Ticker) {
        self.shared.script.lock().tickers.insert(con_id, ticker);
    }

    /// Strip greeks from the next `requests` ticker batches.
    pub fn withhold_greeks_for_requests(&self, requests: usize) {
        self.shared.script.lock().withhold_greeks = requests;
    }

    /// Updates delivered for every snapshot request.
    ///
    /// Offsets are relative to the moment the request is issued.
    pub fn set_snapshot_script(&self, script: Vec<(Duration, Ticker)>) {
        self.shared.script.lock().snapshot_script = script;
    }

    /// Keep snapshot streams open after the script is exhausted.
    pub fn hold_snapshots_open(&self, hold: bool) {
        self.shared.script.lock().hold_snapshots_open = hold;
    }

    /// Bars returned by historical requests.
    pub fn set_bars(&self, bars: Vec<Bar>) {
        self.shared.script.lock().bars = bars;
    }

    /// Every connection attempt so far.
    #[must_use]
    pub fn connect_requests(&self) -> Vec<ConnectRequest> {
        self.shared.script.lock().connect_requests.clone()
    }

    /// Number of `disconnect` calls across all sessions.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.shared.disconnects.load(Ordering::SeqCst)
    }

    /// Number of ticker batches requested.
    #[must_use]
    pub fn ticker_requests(&self) -> usize {
        self.shared.script.lock().ticker_requests
    }

    /// Market data types selected, in order.
    #[must_use]
    pub fn market_data_types(&self) -> Vec<MarketDataType> {
        self.shared.script.lock().market_data_types.clone()
    }
}

#[async_trait]
impl TradingApiConnector for ScriptedConnector {
    type Api = ScriptedTradingApi;

    async fn connect(&self, request: &ConnectRequest) -> Result<Self::Api, TradingApiError> {
        let (delay, reachable) = {
            let mut script = self.shared.script.lock();
            script.connect_requests.push(request.clone());
            (script.connect_delay, script.reachable)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !reachable {
            return Err(TradingApiError::ConnectionFailed(format!(
                "connection refused by {}:{}",
                request.host, request.port
            )));
        }

        Ok(ScriptedTradingApi {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
            open: AtomicBool::new(true),
        })
    }
}

/// Session opened by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedTradingApi {
    shared: Arc<Shared>,
    generation: u64,
    open: AtomicBool,
}

impl ScriptedTradingApi {
    fn ensure_open(&self) -> Result<(), TradingApiError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TradingApiError::Disconnected)
        }
    }
}

#[async_trait]
impl TradingApi for ScriptedTradingApi {
    type Updates = ScriptedUpdates;

    fn is_connected(&self) -> bool {
        self.open.load(Ordering::SeqCst)
            && self.shared.generation.load(Ordering::SeqCst) == self.generation
            && self.shared.script.lock().sessions_alive
    }

    async fn disconnect(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn qualify_contracts(
        &self,
        queries: &[ContractQuery],
    ) -> Result<Vec<Option<VendorRecord>>, TradingApiError> {
        self.ensure_open()?;
        let script = self.shared.script.lock();
        Ok(queries
            .iter()
            .map(|query| {
                script
                    .contracts
                    .iter()
                    .find(|record| Shared::matches(record, query))
                    .cloned()
            })
            .collect())
    }

    async fn set_market_data_type(
        &self,
        data_type: MarketDataType,
    ) -> Result<(), TradingApiError> {
        self.ensure_open()?;
        self.shared.script.lock().market_data_types.push(data_type);
        Ok(())
    }

    async fn request_tickers(&self, contracts: &[Contract]) -> Result<Vec<Ticker>, TradingApiError> {
        self.ensure_open()?;
        let mut script = self.shared.script.lock();
        script.ticker_requests += 1;
        let withhold = script.withhold_greeks > 0;
        if withhold && script.withhold_greeks != usize::MAX {
            script.withhold_greeks -= 1;
        }

        Ok(contracts
            .iter()
            .map(|contract| {
                let mut ticker = script.tickers.get(&contract.con_id).cloned().unwrap_or_default();
                ticker.contract = contract.clone();
                if withhold {
                    ticker.model_greeks = None;
                }
                ticker
            })
            .collect())
    }

    async fn request_snapshot(&self, contract: &Contract) -> Result<Self::Updates, TradingApiError> {
        self.ensure_open()?;
        let script = self.shared.script.lock();
        let updates = script
            .snapshot_script
            .iter()
            .cloned()
            .map(|(offset, mut ticker)| {
                ticker.contract = contract.clone();
                (offset, ticker)
            })
            .collect();

        let updates = ScriptedUpdates::new(updates);
        Ok(if script.hold_snapshots_open {
            updates.hold_open()
        } else {
            updates
        })
    }

    async fn historical_bars(
        &self,
        _contract: &Contract,
        _request: &HistoricalDataRequest,
    ) -> Result<Vec<Bar>, TradingApiError> {
        self.ensure_open()?;
        Ok(self.shared.script.lock().bars.clone())
    }

    async fn managed_accounts(&self) -> Result<Vec<String>, TradingApiError> {
        self.ensure_open()?;
        Ok(self.shared.script.lock().accounts.clone())
    }
}

/// Snapshot update stream replaying a timed script.
#[derive(Debug)]
pub struct ScriptedUpdates {
    started: Instant,
    script: VecDeque<(Duration, Ticker)>,
    hold_open: bool,
}

impl ScriptedUpdates {
    /// Deliver each ticker at its offset from now, then close.
    #[must_use]
    pub fn new(script: Vec<(Duration, Ticker)>) -> Self {
        Self {
            started: Instant::now(),
            script: script.into(),
            hold_open: false,
        }
    }

    /// A stream that never delivers anything.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Vec::new()).hold_open()
    }

    /// Stay open once the script is exhausted instead of closing.
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl TickerUpdates for ScriptedUpdates {
    async fn next_update(&mut self) -> Option<Ticker> {
        let Some((offset, _)) = self.script.front() else {
            return if self.hold_open {
                std::future::pending().await
            } else {
                None
            };
        };

        // Pop only after the sleep so a cancelled wait loses nothing.
        tokio::time::sleep_until(self.started + *offset).await;
        self.script.pop_front().map(|(_, ticker)| ticker)
    }
}
