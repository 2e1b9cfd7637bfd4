//! Caller-facing error taxonomy.
//!
//! Every operation exposed by [`crate::GatewayService`] converts internal and
//! vendor failures into [`GatewayError`].
//!
//! | Reason | Meaning | Retry |
//! |--------|---------|-------|
//! | `RUNTIME_ERROR` | Container runtime unreachable or failed | yes |
//! | `CONNECTION_ERROR` | Trading-API session could not be used | yes |
//! | `COMMAND_FAILED` | Command server write failed | yes |
//! | `DATA_UNAVAILABLE` | No snapshot value (entitlement likely missing) | no |
//! | `CONTRACT_NOT_FOUND` | Contract could not be qualified | no |
//! | `INVALID_REQUEST` | Malformed input | no |
//! | `TIMEOUT` | Operation exceeded its deadline | yes |

use thiserror::Error;

use crate::application::ports::{CommandError, RuntimeError, TradingApiError};
use crate::domain::market_data::SubscriptionClass;

/// Errors surfaced to callers of the gateway engine.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Container runtime failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Trading-API session failure.
    #[error(transparent)]
    Connection(#[from] TradingApiError),

    /// Command channel failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// No market data value was ever observed for the symbol.
    #[error("no market data for {symbol}: {message}")]
    DataUnavailable {
        /// Requested symbol.
        symbol: String,
        /// Cause and suggested remedy.
        message: String,
    },

    /// The contract could not be qualified.
    #[error("no contract found for {0}")]
    ContractNotFound(String),

    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out")]
    Timeout {
        /// Operation that timed out.
        operation: String,
    },
}

impl GatewayError {
    /// Data-unavailable error naming the missing entitlement and the fallback.
    #[must_use]
    pub fn no_market_data(symbol: impl Into<String>, class: SubscriptionClass) -> Self {
        let message = match class {
            SubscriptionClass::Realtime => "the market data subscription for this symbol may be \
                 missing; retry with the delayed class"
                .to_string(),
            SubscriptionClass::Delayed => {
                "the market data subscription for this symbol may be missing".to_string()
            }
        };
        Self::DataUnavailable {
            symbol: symbol.into(),
            message,
        }
    }

    /// Stable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Runtime(_) => "RUNTIME_ERROR",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Command(_) => "COMMAND_FAILED",
            Self::DataUnavailable { .. } => "DATA_UNAVAILABLE",
            Self::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }

    /// Whether retrying the whole request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Runtime(RuntimeError::NotFound(_))
            | Self::Command(CommandError::EmptyCommand)
            | Self::DataUnavailable { .. }
            | Self::ContractNotFound(_)
            | Self::InvalidRequest(_) => false,
            Self::Runtime(_) | Self::Connection(_) | Self::Command(_) | Self::Timeout { .. } => true,
        }
    }
}
