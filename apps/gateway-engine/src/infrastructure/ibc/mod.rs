//! IBC Command Server Client
//!
//! Line-oriented TCP client for the command server embedded in the gateway
//! container. One short-lived connection per command.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::application::ports::{CommandChannel, CommandError};

/// Default connection timeout for the command server.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Command channel over a plain TCP connection.
#[derive(Debug, Clone)]
pub struct TcpCommandChannel {
    address: String,
    connect_timeout: Duration,
}

impl TcpCommandChannel {
    /// Create a channel to `address` (`host:port`).
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Command server address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl CommandChannel for TcpCommandChannel {
    async fn send(&self, command: &str) -> Result<(), CommandError> {
        let command = command.trim();
        if command.is_empty() {
            return Err(CommandError::EmptyCommand);
        }

        let mut stream =
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
                .await
                .map_err(|_| CommandError::Timeout(self.address.clone()))?
                .map_err(|source| CommandError::Connect {
                    address: self.address.clone(),
                    source,
                })?;

        stream
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(CommandError::Write)?;
        stream.flush().await.map_err(CommandError::Write)?;
        stream.shutdown().await.map_err(CommandError::Write)?;

        tracing::info!(command, address = %self.address, "Sent command to gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn sends_newline_terminated_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        TcpCommandChannel::new(address).send("RESTART").await.unwrap();

        assert_eq!(server.await.unwrap(), "RESTART\n");
    }

    #[tokio::test]
    async fn empty_command_is_rejected_without_connecting() {
        let channel = TcpCommandChannel::new("127.0.0.1:1");

        let err = channel.send("   ").await.unwrap_err();

        assert!(matches!(err, CommandError::EmptyCommand));
    }

    #[tokio::test]
    async fn unreachable_server_fails_loudly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpCommandChannel::new(address)
            .send("RESTART")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CommandError::Connect { .. } | CommandError::Timeout(_)
        ));
    }
}
