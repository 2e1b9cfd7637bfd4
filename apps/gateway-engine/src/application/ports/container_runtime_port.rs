//! Container Runtime Port (Driven Port)
//!
//! Interface to the host container runtime that runs the gateway.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything needed to create the gateway container.
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Well-known container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment block (credentials and operating-mode flags).
    pub env: BTreeMap<String, String>,
    /// Container ports, each bound to the same host port.
    pub ports: Vec<u16>,
    /// Restart the container unless it was explicitly stopped.
    pub restart_unless_stopped: bool,
}

impl std::fmt::Debug for ContainerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
        f.debug_struct("ContainerSpec")
            .field("name", &self.name)
            .field("image", &self.image)
            .field("env", &env_keys)
            .field("ports", &self.ports)
            .field("restart_unless_stopped", &self.restart_unless_stopped)
            .finish()
    }
}

/// Result of inspecting a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Runtime container id.
    pub id: String,
    /// Runtime status string (`created`, `running`, `exited`, ...).
    pub status: String,
    /// Whether the container is running.
    pub running: bool,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Last exit time.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Container runtime errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// Container does not exist.
    #[error("container not found: {0}")]
    NotFound(String),

    /// Runtime daemon unreachable.
    #[error("container runtime connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Runtime rejected the request.
    #[error("container runtime error: {message}")]
    Api {
        /// HTTP status reported by the runtime, if any.
        status: Option<u16>,
        /// Error message.
        message: String,
    },
}

impl RuntimeError {
    /// Whether the error means the container is already gone.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Port for the container runtime.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a container by name; `None` if it does not exist.
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError>;

    /// Pull an image so a fresh container can be created from it.
    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create a container, returning its id.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Start a created container.
    async fn start(&self, name: &str) -> Result<(), RuntimeError>;

    /// Stop a running container, waiting up to `timeout` before killing it.
    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError>;

    /// Force-remove a container.
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;

    /// Last `tail` lines of combined stdout and stderr.
    async fn logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError>;
}
