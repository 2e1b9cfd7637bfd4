//! Ticker records and snapshot construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MarketDataType;
use super::contract::{Contract, SecurityType};

/// Return the value only if it is a finite number.
#[must_use]
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Return a size or volume only if it is finite and non-negative.
#[must_use]
pub fn non_negative_size(value: Option<f64>) -> Option<u64> {
    value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

// =============================================================================
// Vendor Ticker
// =============================================================================

/// Option sensitivities.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Greeks {
    /// Delta.
    pub delta: Option<f64>,
    /// Gamma.
    pub gamma: Option<f64>,
    /// Vega.
    pub vega: Option<f64>,
    /// Theta.
    pub theta: Option<f64>,
    /// Implied volatility.
    pub implied_vol: Option<f64>,
}

impl Greeks {
    /// Drop non-finite analytics values.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            delta: finite(self.delta),
            gamma: finite(self.gamma),
            vega: finite(self.vega),
            theta: finite(self.theta),
            implied_vol: finite(self.implied_vol),
        }
    }
}

/// Latest ticker state as delivered by the vendor client.
///
/// Numeric fields are raw and may hold NaN or infinities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ticker {
    /// Contract the ticker belongs to.
    pub contract: Contract,
    /// Time of the last update; `None` until any value has arrived.
    pub time: Option<DateTime<Utc>>,
    /// Last traded price.
    pub last: Option<f64>,
    /// Best bid.
    pub bid: Option<f64>,
    /// Best ask.
    pub ask: Option<f64>,
    /// Bid size.
    pub bid_size: Option<f64>,
    /// Ask size.
    pub ask_size: Option<f64>,
    /// Session volume.
    pub volume: Option<f64>,
    /// Model analytics, populated asynchronously for options.
    pub model_greeks: Option<Greeks>,
}

impl Ticker {
    /// Whether the ticker has reported any timestamped value.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.time.is_some()
    }
}

// =============================================================================
// Ticker Snapshot
// =============================================================================

/// Per-contract result of a multi-symbol ticker request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// Vendor contract id.
    pub contract_id: i64,
    /// Display symbol (local symbol for options).
    pub symbol: String,
    /// Security type.
    pub security_type: SecurityType,
    /// Last price.
    pub last: Option<f64>,
    /// Bid price.
    pub bid: Option<f64>,
    /// Ask price.
    pub ask: Option<f64>,
    /// Option analytics; always `None` for non-option contracts.
    pub greeks: Option<Greeks>,
    /// When the snapshot was built.
    pub timestamp: DateTime<Utc>,
    /// Data type the ticker was requested under.
    pub market_data_type: Option<MarketDataType>,
}

impl TickerSnapshot {
    /// Map a vendor ticker into a snapshot.
    ///
    /// Greeks are carried only for option-like contracts whose analytics
    /// stream has populated them.
    #[must_use]
    pub fn from_ticker(
        ticker: &Ticker,
        data_type: MarketDataType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let contract = &ticker.contract;
        let greeks = if contract.sec_type.is_option_like() {
            ticker.model_greeks.map(Greeks::sanitized)
        } else {
            None
        };

        Self {
            contract_id: contract.con_id,
            symbol: contract.display_symbol().to_string(),
            security_type: contract.sec_type.clone(),
            last: finite(ticker.last),
            bid: finite(ticker.bid),
            ask: finite(ticker.ask),
            greeks,
            timestamp,
            market_data_type: Some(data_type),
        }
    }

    /// Whether this is an option-like contract.
    #[must_use]
    pub const fn is_option(&self) -> bool {
        self.security_type.is_option_like()
    }
}

/// Whether a batch is missing option analytics.
///
/// True when the batch holds at least one option-like contract and none of
/// them carries greeks.
#[must_use]
pub fn greeks_missing(snapshots: &[TickerSnapshot]) -> bool {
    let mut options = snapshots.iter().filter(|s| s.is_option()).peekable();
    options.peek().is_some() && options.all(|s| s.greeks.is_none())
}

// =============================================================================
// Tick Data
// =============================================================================

/// Sanitized single-symbol market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    /// Requested symbol.
    pub symbol: String,
    /// Vendor contract id.
    pub contract_id: Option<i64>,
    /// Last price.
    pub last: Option<f64>,
    /// Bid price.
    pub bid: Option<f64>,
    /// Ask price.
    pub ask: Option<f64>,
    /// Bid size.
    pub bid_size: Option<u64>,
    /// Ask size.
    pub ask_size: Option<u64>,
    /// Session volume.
    pub volume: Option<u64>,
    /// When the snapshot was built.
    pub timestamp: DateTime<Utc>,
}

impl TickData {
    /// Build a tick record, coercing every malformed number to `None`.
    #[must_use]
    pub fn sanitized(
        symbol: impl Into<String>,
        contract_id: Option<i64>,
        ticker: &Ticker,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            contract_id,
            last: finite(ticker.last),
            bid: finite(ticker.bid),
            ask: finite(ticker.ask),
            bid_size: non_negative_size(ticker.bid_size),
            ask_size: non_negative_size(ticker.ask_size),
            volume: non_negative_size(ticker.volume),
            timestamp,
        }
    }
}

/// Outcome of the snapshot stabilization wait.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StabilizationResult {
    /// First ticker state carrying a timestamped value.
    pub tick: Option<Ticker>,
    /// Whether the wait gave up without a value.
    pub timed_out: bool,
}

impl StabilizationResult {
    /// A value was observed.
    #[must_use]
    pub const fn value(tick: Ticker) -> Self {
        Self {
            tick: Some(tick),
            timed_out: false,
        }
    }

    /// No value arrived in time.
    #[must_use]
    pub const fn timed_out() -> Self {
        Self {
            tick: None,
            timed_out: true,
        }
    }
}

/// Delta range used to filter option tickers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeltaCriteria {
    /// Inclusive lower bound.
    pub min_delta: Option<f64>,
    /// Inclusive upper bound.
    pub max_delta: Option<f64>,
}

impl DeltaCriteria {
    /// Whether the snapshot passes the criteria.
    ///
    /// With any bound set, snapshots without a delta are rejected.
    #[must_use]
    pub fn matches(&self, snapshot: &TickerSnapshot) -> bool {
        if self.min_delta.is_none() && self.max_delta.is_none() {
            return true;
        }
        let Some(delta) = snapshot.greeks.and_then(|g| g.delta) else {
            return false;
        };
        self.min_delta.is_none_or(|min| delta >= min) && self.max_delta.is_none_or(|max| delta <= max)
    }
}
