//! Contract descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::naming::snake_case_keys;

/// Instrument security type as reported by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SecurityType {
    /// Common stock (`STK`).
    #[default]
    Stock,
    /// Equity or index option (`OPT`).
    Option,
    /// Option on a future (`FOP`).
    FutureOption,
    /// Future (`FUT`).
    Future,
    /// Index (`IND`).
    Index,
    /// Forex pair (`CASH`).
    Cash,
    /// Any other vendor code, kept verbatim.
    Other(String),
}

impl SecurityType {
    /// Vendor code for this security type.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Stock => "STK",
            Self::Option => "OPT",
            Self::FutureOption => "FOP",
            Self::Future => "FUT",
            Self::Index => "IND",
            Self::Cash => "CASH",
            Self::Other(code) => code,
        }
    }

    /// Whether contracts of this type carry option analytics.
    #[must_use]
    pub const fn is_option_like(&self) -> bool {
        matches!(self, Self::Option | Self::FutureOption)
    }
}

impl From<String> for SecurityType {
    fn from(code: String) -> Self {
        match code.to_uppercase().as_str() {
            "STK" => Self::Stock,
            "OPT" => Self::Option,
            "FOP" => Self::FutureOption,
            "FUT" => Self::Future,
            "IND" => Self::Index,
            "CASH" => Self::Cash,
            _ => Self::Other(code),
        }
    }
}

impl From<&str> for SecurityType {
    fn from(code: &str) -> Self {
        Self::from(code.to_string())
    }
}

impl From<SecurityType> for String {
    fn from(sec_type: SecurityType) -> Self {
        sec_type.code().to_string()
    }
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Partial contract description submitted for qualification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContractQuery {
    /// Vendor contract id, when known.
    pub con_id: Option<i64>,
    /// Ticker symbol.
    pub symbol: Option<String>,
    /// Security type.
    pub sec_type: Option<SecurityType>,
    /// Routing exchange.
    pub exchange: Option<String>,
    /// Currency.
    pub currency: Option<String>,
}

impl ContractQuery {
    /// Query by contract id only.
    #[must_use]
    pub fn by_id(con_id: i64) -> Self {
        Self {
            con_id: Some(con_id),
            ..Self::default()
        }
    }

    /// Query by symbol, type, exchange and currency.
    #[must_use]
    pub fn by_symbol(
        symbol: impl Into<String>,
        sec_type: SecurityType,
        exchange: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            con_id: None,
            symbol: Some(symbol.into()),
            sec_type: Some(sec_type),
            exchange: Some(exchange.into()),
            currency: Some(currency.into()),
        }
    }

    /// Short description for log lines and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.con_id, &self.symbol) {
            (Some(id), _) => format!("conId={id}"),
            (None, Some(symbol)) => format!(
                "{symbol} (type: {}, exchange: {}, currency: {})",
                self.sec_type
                    .as_ref()
                    .map_or("?", SecurityType::code),
                self.exchange.as_deref().unwrap_or("?"),
                self.currency.as_deref().unwrap_or("?"),
            ),
            (None, None) => "<empty contract>".to_string(),
        }
    }
}

/// Fully qualified contract descriptor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    /// Vendor contract id.
    pub con_id: i64,
    /// Underlying symbol.
    pub symbol: String,
    /// Security type.
    pub sec_type: SecurityType,
    /// Exchange-local symbol (e.g. OCC option symbol).
    pub local_symbol: String,
    /// Routing exchange.
    pub exchange: String,
    /// Primary listing exchange.
    pub primary_exchange: String,
    /// Currency.
    pub currency: String,
    /// Expiry (`YYYYMMDD`) or contract month.
    pub last_trade_date_or_contract_month: String,
    /// Option strike.
    pub strike: f64,
    /// Option right (`C` or `P`).
    pub right: String,
    /// Contract multiplier.
    pub multiplier: String,
    /// Trading class.
    pub trading_class: String,
}

impl Contract {
    /// Build a contract from a vendor record with camelCase field names.
    ///
    /// # Errors
    ///
    /// Returns an error if a known field has an incompatible type.
    pub fn from_vendor_record(record: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(snake_case_keys(record)))
    }

    /// Symbol shown to callers: the local symbol when present.
    #[must_use]
    pub fn display_symbol(&self) -> &str {
        if self.local_symbol.is_empty() {
            &self.symbol
        } else {
            &self.local_symbol
        }
    }

    /// Exchange whose calendar governs this contract.
    ///
    /// Smart-routed contracts fall back to their primary listing.
    #[must_use]
    pub fn calendar_exchange(&self) -> &str {
        if !self.primary_exchange.is_empty() {
            &self.primary_exchange
        } else if !self.exchange.is_empty() && self.exchange != "SMART" {
            &self.exchange
        } else {
            ""
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn security_type_codes() {
        assert_eq!(SecurityType::from("OPT"), SecurityType::Option);
        assert_eq!(SecurityType::from("fop"), SecurityType::FutureOption);
        assert_eq!(SecurityType::from("STK"), SecurityType::Stock);
        assert_eq!(
            SecurityType::from("WAR"),
            SecurityType::Other("WAR".to_string())
        );
        assert_eq!(SecurityType::Other("WAR".to_string()).code(), "WAR");
    }

    #[test]
    fn option_like_types() {
        assert!(SecurityType::Option.is_option_like());
        assert!(SecurityType::FutureOption.is_option_like());
        assert!(!SecurityType::Stock.is_option_like());
        assert!(!SecurityType::Future.is_option_like());
        assert!(!SecurityType::Other("OPTX".to_string()).is_option_like());
    }

    #[test]
    fn contract_from_vendor_record() {
        let contract = Contract::from_vendor_record(record(json!({
            "conId": 265_598,
            "symbol": "AAPL",
            "secType": "STK",
            "exchange": "SMART",
            "primaryExchange": "NASDAQ",
            "currency": "USD",
            "localSymbol": "AAPL",
            "tradingClass": "NMS",
            "comboLegs": []
        })))
        .unwrap();

        assert_eq!(contract.con_id, 265_598);
        assert_eq!(contract.sec_type, SecurityType::Stock);
        assert_eq!(contract.primary_exchange, "NASDAQ");
        assert_eq!(contract.trading_class, "NMS");
        assert_eq!(contract.calendar_exchange(), "NASDAQ");
    }

    #[test]
    fn option_record_uses_local_symbol() {
        let contract = Contract::from_vendor_record(record(json!({
            "conId": 712_345_678,
            "symbol": "SPX",
            "secType": "OPT",
            "localSymbol": "SPXW  250505P05490000",
            "lastTradeDateOrContractMonth": "20250505",
            "strike": 5490.0,
            "right": "P"
        })))
        .unwrap();

        assert!(contract.sec_type.is_option_like());
        assert_eq!(contract.display_symbol(), "SPXW  250505P05490000");
        assert_eq!(contract.last_trade_date_or_contract_month, "20250505");
    }

    #[test]
    fn display_symbol_falls_back_to_symbol() {
        let contract = Contract {
            symbol: "MSFT".to_string(),
            ..Contract::default()
        };
        assert_eq!(contract.display_symbol(), "MSFT");
    }

    #[test]
    fn incompatible_field_is_rejected() {
        let result = Contract::from_vendor_record(record(json!({ "conId": "not-a-number" })));
        assert!(result.is_err());
    }

    #[test]
    fn query_descriptions() {
        assert_eq!(ContractQuery::by_id(42).describe(), "conId=42");
        let query = ContractQuery::by_symbol("AAPL", SecurityType::Stock, "SMART", "USD");
        assert_eq!(
            query.describe(),
            "AAPL (type: STK, exchange: SMART, currency: USD)"
        );
    }
}
