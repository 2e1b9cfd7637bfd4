//! In-memory adapters for testing.
//!
//! Stand-ins for the container runtime, the vendor trading-API client, the
//! command server and the exchange calendar. Not for production use.

mod runtime;
mod trading_api;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub use runtime::{InMemoryContainerRuntime, RuntimeCalls};
pub use trading_api::{ScriptedConnector, ScriptedTradingApi, ScriptedUpdates};

use crate::application::ports::{
    CommandChannel, CommandError, ExchangeCalendar, GatewayCommand,
};

/// Command channel that records every command it is given.
///
/// When linked to a [`ScriptedConnector`], `RESTART` drops its sessions the
/// way a real gateway restart does.
#[derive(Debug, Default)]
pub struct RecordingCommandChannel {
    sent: Mutex<Vec<String>>,
    unreachable: AtomicBool,
    linked: Option<ScriptedConnector>,
}

impl RecordingCommandChannel {
    /// Create a channel that accepts every command.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the connector's sessions on `RESTART`.
    #[must_use]
    pub fn linked_to(mut self, connector: &ScriptedConnector) -> Self {
        self.linked = Some(connector.clone());
        self
    }

    /// Fail every send when `true`.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Commands sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl CommandChannel for RecordingCommandChannel {
    async fn send(&self, command: &str) -> Result<(), CommandError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(CommandError::EmptyCommand);
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CommandError::Timeout("in-memory command server".to_string()));
        }

        self.sent.lock().push(command.to_string());
        if command == GatewayCommand::Restart.as_str()
            && let Some(connector) = &self.linked
        {
            connector.drop_sessions();
        }
        Ok(())
    }
}

/// Calendar whose market is open or closed on demand.
#[derive(Debug)]
pub struct StaticCalendar {
    open: AtomicBool,
    queried: Mutex<Vec<String>>,
}

impl StaticCalendar {
    /// Create a calendar with the market `open` or closed.
    #[must_use]
    pub const fn new(open: bool) -> Self {
        Self {
            open: AtomicBool::new(open),
            queried: Mutex::new(Vec::new()),
        }
    }

    /// Open or close the market.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Exchanges looked up so far.
    #[must_use]
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().clone()
    }
}

impl ExchangeCalendar for StaticCalendar {
    fn is_trading_minute(&self, exchange: &str, _at: DateTime<Utc>) -> bool {
        self.queried.lock().push(exchange.to_string());
        self.open.load(Ordering::SeqCst)
    }
}
