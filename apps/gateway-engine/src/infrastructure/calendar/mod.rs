//! Exchange Calendar
//!
//! Trading-minute lookup for US equity and option venues. Holidays, regular
//! hours and early closes come from the NYSE calendar in New York time.
//! Venues outside the US list are looked up against the same calendar.

use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use trading_calendar::{Market, TradingCalendar};

use crate::application::ports::ExchangeCalendar;

/// Venues that follow the NYSE holiday schedule.
const US_VENUES: &[&str] = &[
    "NYSE", "NASDAQ", "ISLAND", "ARCA", "AMEX", "BATS", "IEX", "CBOE", "BOX", "PHLX", "ISE",
    "MIAX", "PEARL", "SMART",
];

/// Calendar errors.
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// Calendar data could not be loaded.
    #[error("failed to load exchange calendar: {0}")]
    Load(String),
}

/// NYSE-hours calendar for US venues.
pub struct NyseCalendar {
    calendar: TradingCalendar,
}

impl std::fmt::Debug for NyseCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NyseCalendar")
            .field("market", &self.calendar.market())
            .finish()
    }
}

impl NyseCalendar {
    /// Load the NYSE holiday calendar.
    ///
    /// # Errors
    ///
    /// Returns an error if the calendar data cannot be loaded.
    pub fn new() -> Result<Self, CalendarError> {
        let calendar =
            TradingCalendar::new(Market::NYSE).map_err(|e| CalendarError::Load(format!("{e:?}")))?;
        Ok(Self { calendar })
    }

    /// Whether `exchange` follows this calendar.
    #[must_use]
    pub fn covers(exchange: &str) -> bool {
        let exchange = exchange.to_ascii_uppercase();
        US_VENUES.contains(&exchange.as_str())
    }
}

impl ExchangeCalendar for NyseCalendar {
    /// Regular session only; pre-market and after-hours count as closed.
    ///
    /// Exchanges outside [`US_VENUES`] get NYSE hours.
    fn is_trading_minute(&self, exchange: &str, at: DateTime<Utc>) -> bool {
        if !Self::covers(exchange) {
            tracing::debug!(exchange, "No calendar for exchange, using NYSE");
        }

        let local = at.with_timezone(&New_York);
        let date = local.date_naive();
        let trading_day = self.calendar.is_trading_day(date).unwrap_or_else(|e| {
            tracing::warn!(%date, error = ?e, "Calendar lookup failed, assuming closed");
            false
        });
        if !trading_day {
            return false;
        }

        let hours = self.calendar.trading_hours(date);
        let time = local.time();
        time >= hours.regular.start && time < hours.market_close()
    }
}
