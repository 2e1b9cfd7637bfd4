//! Market Data Domain
//!
//! Typed records for contracts, tickers, snapshots and historical bars,
//! plus the rules that pick a market data type for a request.

mod contract;
mod ticker;

pub use contract::{Contract, ContractQuery, SecurityType};
pub use ticker::{
    DeltaCriteria, Greeks, StabilizationResult, TickData, Ticker, TickerSnapshot, finite,
    greeks_missing, non_negative_size,
};

use serde::{Deserialize, Serialize};

// =============================================================================
// Market Data Type
// =============================================================================

/// Vendor market data type, selected per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketDataType {
    /// Streaming real-time data.
    Live,
    /// Last real-time values, served while the market is closed.
    Frozen,
    /// Delayed streaming data.
    Delayed,
    /// Last delayed values, served while the market is closed.
    DelayedFrozen,
}

impl MarketDataType {
    /// Vendor request code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Live => 1,
            Self::Frozen => 2,
            Self::Delayed => 3,
            Self::DelayedFrozen => 4,
        }
    }

    /// Parse a vendor request code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Live),
            2 => Some(Self::Frozen),
            3 => Some(Self::Delayed),
            4 => Some(Self::DelayedFrozen),
            _ => None,
        }
    }

    /// Frozen counterpart of this type.
    #[must_use]
    pub const fn frozen(self) -> Self {
        match self {
            Self::Live | Self::Frozen => Self::Frozen,
            Self::Delayed | Self::DelayedFrozen => Self::DelayedFrozen,
        }
    }

    /// Data type for multi-symbol ticker batches.
    ///
    /// Frozen variants are never used here.
    #[must_use]
    pub const fn for_ticker_batch(market_open: bool) -> Self {
        if market_open { Self::Live } else { Self::Delayed }
    }

    /// Data type for a single-symbol snapshot of the given class.
    #[must_use]
    pub const fn for_snapshot(class: SubscriptionClass, market_open: bool) -> Self {
        let base = class.base_type();
        if market_open { base } else { base.frozen() }
    }
}

/// Subscription class requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionClass {
    /// Real-time data (requires an exchange entitlement).
    #[default]
    Realtime,
    /// Delayed data (free).
    Delayed,
}

impl SubscriptionClass {
    /// Parse a class name, defaulting to realtime.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "delayed" => Self::Delayed,
            _ => Self::Realtime,
        }
    }

    /// Streaming data type for this class.
    #[must_use]
    pub const fn base_type(self) -> MarketDataType {
        match self {
            Self::Realtime => MarketDataType::Live,
            Self::Delayed => MarketDataType::Delayed,
        }
    }

    /// Class name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Delayed => "delayed",
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Single-symbol snapshot request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    /// Symbol to look up.
    pub symbol: String,
    /// Security type.
    pub sec_type: SecurityType,
    /// Routing exchange.
    pub exchange: String,
    /// Currency.
    pub currency: String,
    /// Contract id for direct lookup.
    pub con_id: Option<i64>,
    /// Subscription class.
    pub class: SubscriptionClass,
}

impl SnapshotRequest {
    /// Smart-routed USD stock snapshot with realtime class.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sec_type: SecurityType::Stock,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            con_id: None,
            class: SubscriptionClass::Realtime,
        }
    }

    /// Set the subscription class.
    #[must_use]
    pub const fn with_class(mut self, class: SubscriptionClass) -> Self {
        self.class = class;
        self
    }

    /// Look the contract up by id instead of symbol.
    #[must_use]
    pub const fn with_con_id(mut self, con_id: i64) -> Self {
        self.con_id = Some(con_id);
        self
    }

    /// Qualification query for this request.
    #[must_use]
    pub fn query(&self) -> ContractQuery {
        self.con_id.map_or_else(
            || {
                ContractQuery::by_symbol(
                    self.symbol.clone(),
                    self.sec_type.clone(),
                    self.exchange.clone(),
                    self.currency.clone(),
                )
            },
            ContractQuery::by_id,
        )
    }
}

/// Historical bar request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    /// Symbol.
    pub symbol: String,
    /// Security type code.
    pub sec_type: String,
    /// Exchange.
    pub exchange: String,
    /// Currency.
    pub currency: String,
    /// Duration string (`1 D`, `1 W`, `1 M`).
    pub duration: String,
    /// Bar size (`1 min`, `5 mins`, `1 hour`, `1 day`).
    pub bar_size: String,
    /// Series to show (`TRADES`, `MIDPOINT`, `BID`, `ASK`).
    pub what_to_show: String,
    /// Regular trading hours only.
    pub use_rth: bool,
}

impl HistoricalDataRequest {
    /// One day of one-minute trade bars for a smart-routed USD stock.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sec_type: "STK".to_string(),
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
            duration: "1 D".to_string(),
            bar_size: "1 min".to_string(),
            what_to_show: "TRADES".to_string(),
            use_rth: true,
        }
    }

    /// Uppercase the contract fields.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.symbol = self.symbol.to_uppercase();
        self.sec_type = self.sec_type.to_uppercase();
        self.exchange = self.exchange.to_uppercase();
        self.currency = self.currency.to_uppercase();
        self
    }

    /// Qualification query for this request.
    #[must_use]
    pub fn query(&self) -> ContractQuery {
        ContractQuery::by_symbol(
            self.symbol.clone(),
            SecurityType::from(self.sec_type.as_str()),
            self.exchange.clone(),
            self.currency.clone(),
        )
    }
}

// =============================================================================
// Historical Bars
// =============================================================================

/// Historical bar as delivered by the vendor client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bar {
    /// Bar date or timestamp as formatted by the vendor.
    pub date: String,
    /// Open.
    pub open: f64,
    /// High.
    pub high: f64,
    /// Low.
    pub low: f64,
    /// Close.
    pub close: f64,
    /// Volume, if reported.
    pub volume: Option<f64>,
    /// Weighted average price, if reported.
    pub wap: Option<f64>,
    /// Trade count, if reported.
    pub bar_count: Option<i64>,
}

/// Historical OHLCV bar returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    /// Bar date or timestamp.
    pub date: String,
    /// Open.
    pub open: f64,
    /// High.
    pub high: f64,
    /// Low.
    pub low: f64,
    /// Close.
    pub close: f64,
    /// Volume (0 when not reported).
    pub volume: u64,
    /// Weighted average price.
    pub wap: Option<f64>,
    /// Trade count.
    pub count: Option<u64>,
}

impl From<Bar> for BarData {
    fn from(bar: Bar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: non_negative_size(bar.volume).unwrap_or(0),
            wap: finite(bar.wap),
            count: bar.bar_count.and_then(|c| u64::try_from(c).ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(MarketDataType::Live, 1)]
    #[test_case(MarketDataType::Frozen, 2)]
    #[test_case(MarketDataType::Delayed, 3)]
    #[test_case(MarketDataType::DelayedFrozen, 4)]
    fn data_type_codes(data_type: MarketDataType, code: i32) {
        assert_eq!(data_type.code(), code);
        assert_eq!(MarketDataType::from_code(code), Some(data_type));
    }

    #[test]
    fn unknown_code() {
        assert_eq!(MarketDataType::from_code(0), None);
        assert_eq!(MarketDataType::from_code(5), None);
    }

    #[test_case(true, MarketDataType::Live)]
    #[test_case(false, MarketDataType::Delayed)]
    fn ticker_batch_never_frozen(open: bool, expected: MarketDataType) {
        assert_eq!(MarketDataType::for_ticker_batch(open), expected);
    }

    #[test_case(SubscriptionClass::Realtime, true, MarketDataType::Live)]
    #[test_case(SubscriptionClass::Realtime, false, MarketDataType::Frozen)]
    #[test_case(SubscriptionClass::Delayed, true, MarketDataType::Delayed)]
    #[test_case(SubscriptionClass::Delayed, false, MarketDataType::DelayedFrozen)]
    fn snapshot_type_demotes_when_closed(
        class: SubscriptionClass,
        open: bool,
        expected: MarketDataType,
    ) {
        assert_eq!(MarketDataType::for_snapshot(class, open), expected);
    }

    #[test]
    fn frozen_is_idempotent() {
        assert_eq!(MarketDataType::Frozen.frozen(), MarketDataType::Frozen);
        assert_eq!(
            MarketDataType::DelayedFrozen.frozen(),
            MarketDataType::DelayedFrozen
        );
    }

    #[test]
    fn subscription_class_parsing() {
        assert_eq!(
            SubscriptionClass::from_str_case_insensitive("DELAYED"),
            SubscriptionClass::Delayed
        );
        assert_eq!(
            SubscriptionClass::from_str_case_insensitive("realtime"),
            SubscriptionClass::Realtime
        );
        assert_eq!(
            SubscriptionClass::from_str_case_insensitive("anything"),
            SubscriptionClass::Realtime
        );
    }

    #[test]
    fn snapshot_request_prefers_contract_id() {
        let request = SnapshotRequest::new("AAPL").with_con_id(265_598);
        assert_eq!(request.query(), ContractQuery::by_id(265_598));

        let request = SnapshotRequest::new("AAPL");
        assert_eq!(request.query().symbol.as_deref(), Some("AAPL"));
        assert_eq!(request.query().exchange.as_deref(), Some("SMART"));
    }

    #[test]
    fn historical_request_normalization() {
        let request = HistoricalDataRequest {
            exchange: "smart".to_string(),
            currency: "usd".to_string(),
            sec_type: "stk".to_string(),
            ..HistoricalDataRequest::new("aapl")
        }
        .normalized();

        assert_eq!(request.symbol, "AAPL");
        assert_eq!(request.sec_type, "STK");
        assert_eq!(request.exchange, "SMART");
        assert_eq!(request.currency, "USD");
        assert_eq!(request.bar_size, "1 min");
    }

    #[test]
    fn bar_defaults_missing_volume_to_zero() {
        let bar = BarData::from(Bar {
            date: "2024-01-15T09:30:00".to_string(),
            open: 150.25,
            high: 151.0,
            low: 150.1,
            close: 150.75,
            volume: None,
            wap: Some(f64::NAN),
            bar_count: Some(450),
        });
        assert_eq!(bar.volume, 0);
        assert!(bar.wap.is_none());
        assert_eq!(bar.count, Some(450));
    }
}
