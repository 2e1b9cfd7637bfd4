//! Command Channel Port (Driven Port)
//!
//! Administrative text commands for the gateway's embedded command server.

use async_trait::async_trait;

/// Commands understood by the gateway command server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCommand {
    /// Restart the gateway process.
    Restart,
    /// Shut the gateway down.
    Stop,
    /// Reconnect the account session.
    ReconnectAccount,
    /// Reconnect the market data farms.
    ReconnectData,
    /// Enable the trading API.
    EnableApi,
}

impl GatewayCommand {
    /// Wire form of the command.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Restart => "RESTART",
            Self::Stop => "STOP",
            Self::ReconnectAccount => "RECONNECTACCOUNT",
            Self::ReconnectData => "RECONNECTDATA",
            Self::EnableApi => "ENABLEAPI",
        }
    }
}

impl std::fmt::Display for GatewayCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command channel errors.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Empty commands are rejected before connecting.
    #[error("command cannot be empty")]
    EmptyCommand,

    /// The command server could not be reached.
    #[error("failed to connect to command server at {address}: {source}")]
    Connect {
        /// Command server address.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the command failed.
    #[error("failed to send command: {0}")]
    Write(#[source] std::io::Error),

    /// The connection attempt timed out.
    #[error("timed out connecting to command server at {0}")]
    Timeout(String),
}

/// Port for sending administrative commands to the gateway.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Send one command line. Failures are always propagated.
    async fn send(&self, command: &str) -> Result<(), CommandError>;
}
