//! Gateway Process Domain
//!
//! Lifecycle state of the broker gateway container and the point-in-time
//! records returned to monitoring callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel reported when no gateway container exists.
pub const CONTAINER_NOT_FOUND: &str = "container not found";

// =============================================================================
// Process State
// =============================================================================

/// Lifecycle state of the gateway process, owned by the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayProcessState {
    /// No container is running under our control.
    #[default]
    Absent,
    /// Container created or adopted, waiting for the API port to answer.
    Starting,
    /// Probe succeeded.
    Running,
    /// Probe failed after previously succeeding.
    Unhealthy,
    /// Stop requested, container being removed.
    Stopping,
}

/// Lifecycle events that drive [`GatewayProcessState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// `start()` was requested.
    StartRequested,
    /// A running container was found and taken over without restarting.
    Adopted,
    /// A probe answered.
    ProbeSucceeded,
    /// A probe failed.
    ProbeFailed,
    /// Readiness wait exceeded the connection timeout.
    ReadyTimedOut,
    /// Container creation or start failed.
    StartFailed,
    /// `stop()` was requested.
    StopRequested,
    /// Container removed (or already gone).
    Removed,
}

impl GatewayProcessState {
    /// Apply an event, returning the next state.
    ///
    /// Events that have no meaning in the current state leave it unchanged.
    #[must_use]
    pub const fn on(self, event: LifecycleEvent) -> Self {
        match (self, event) {
            (Self::Stopping, LifecycleEvent::StartRequested) => Self::Stopping,
            (_, LifecycleEvent::StartRequested) => Self::Starting,
            (Self::Stopping, LifecycleEvent::Adopted) => Self::Stopping,
            (_, LifecycleEvent::Adopted) => Self::Running,
            (Self::Starting | Self::Unhealthy, LifecycleEvent::ProbeSucceeded) => Self::Running,
            (Self::Starting, LifecycleEvent::ReadyTimedOut | LifecycleEvent::StartFailed) => {
                Self::Absent
            }
            (Self::Running, LifecycleEvent::ProbeFailed) => Self::Unhealthy,
            (Self::Running | Self::Unhealthy | Self::Starting, LifecycleEvent::StopRequested) => {
                Self::Stopping
            }
            (_, LifecycleEvent::Removed) => Self::Absent,
            (state, _) => state,
        }
    }

    /// Whether a gateway container is believed to be up under our control.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Unhealthy)
    }

    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Unhealthy => "unhealthy",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for GatewayProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Container Status
// =============================================================================

/// Health of a running gateway as observed by the rate-limited probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// API port accepted a session.
    Healthy,
    /// API port refused or did not answer.
    Unhealthy,
    /// The probe itself could not complete.
    HealthCheckFailed,
    /// Container is not running, no probe was made.
    Unknown,
}

/// Point-in-time snapshot of the gateway container.
///
/// Built at read time from the runtime; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Runtime status string (`running`, `exited`, ...), `not_found` or `error`.
    pub status: String,
    /// Probe outcome, only computed for running containers.
    pub health: HealthState,
    /// Container creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Last exit time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Seconds since creation.
    pub age_seconds: Option<f64>,
    /// Failure description when the status could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContainerStatus {
    /// Status reported when the container does not exist.
    #[must_use]
    pub fn not_found() -> Self {
        Self::empty("not_found", None)
    }

    /// Status reported when the runtime could not be queried.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::empty("error", Some(message.into()))
    }

    fn empty(status: &str, error: Option<String>) -> Self {
        Self {
            status: status.to_string(),
            health: HealthState::Unknown,
            created_at: None,
            started_at: None,
            finished_at: None,
            age_seconds: None,
            error,
        }
    }

    /// Whether the runtime reports the container as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Tail of the container's combined output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GatewayLogs {
    /// Trimmed, non-empty log lines, oldest first.
    pub logs: Vec<String>,
    /// Set when the logs could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatewayLogs {
    /// Split raw container output into trimmed, non-empty lines.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        Self {
            logs: raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect(),
            error: None,
        }
    }

    /// Sentinel for a missing container.
    #[must_use]
    pub fn container_not_found() -> Self {
        Self {
            logs: Vec::new(),
            error: Some(CONTAINER_NOT_FOUND.to_string()),
        }
    }

    /// Logs that could not be read.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            logs: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_to_running() {
        let state = GatewayProcessState::Absent
            .on(LifecycleEvent::StartRequested)
            .on(LifecycleEvent::ProbeSucceeded);
        assert_eq!(state, GatewayProcessState::Running);
    }

    #[test]
    fn adopting_a_running_container() {
        assert_eq!(
            GatewayProcessState::Absent.on(LifecycleEvent::Adopted),
            GatewayProcessState::Running
        );
        assert_eq!(
            GatewayProcessState::Starting.on(LifecycleEvent::Adopted),
            GatewayProcessState::Running
        );
    }

    #[test]
    fn restart_from_running_passes_through_starting() {
        for state in [
            GatewayProcessState::Absent,
            GatewayProcessState::Running,
            GatewayProcessState::Unhealthy,
        ] {
            let starting = state.on(LifecycleEvent::StartRequested);
            assert_eq!(starting, GatewayProcessState::Starting);
            assert_eq!(
                starting.on(LifecycleEvent::StartFailed),
                GatewayProcessState::Absent
            );
        }
        assert_eq!(
            GatewayProcessState::Stopping.on(LifecycleEvent::StartRequested),
            GatewayProcessState::Stopping
        );
    }

    #[test]
    fn ready_timeout_returns_to_absent() {
        let state = GatewayProcessState::Starting.on(LifecycleEvent::ReadyTimedOut);
        assert_eq!(state, GatewayProcessState::Absent);
    }

    #[test]
    fn probe_failure_only_degrades_running() {
        assert_eq!(
            GatewayProcessState::Running.on(LifecycleEvent::ProbeFailed),
            GatewayProcessState::Unhealthy
        );
        assert_eq!(
            GatewayProcessState::Starting.on(LifecycleEvent::ProbeFailed),
            GatewayProcessState::Starting
        );
        assert_eq!(
            GatewayProcessState::Absent.on(LifecycleEvent::ProbeFailed),
            GatewayProcessState::Absent
        );
    }

    #[test]
    fn unhealthy_recovers_on_probe_success() {
        assert_eq!(
            GatewayProcessState::Unhealthy.on(LifecycleEvent::ProbeSucceeded),
            GatewayProcessState::Running
        );
    }

    #[test]
    fn stop_then_removed() {
        let state = GatewayProcessState::Running
            .on(LifecycleEvent::StopRequested)
            .on(LifecycleEvent::Removed);
        assert_eq!(state, GatewayProcessState::Absent);
    }

    #[test]
    fn not_found_status_has_null_timestamps() {
        let status = ContainerStatus::not_found();
        assert_eq!(status.status, "not_found");
        assert_eq!(status.health, HealthState::Unknown);
        assert!(status.created_at.is_none());
        assert!(status.started_at.is_none());
        assert!(status.finished_at.is_none());
        assert!(status.age_seconds.is_none());
        assert!(!status.is_running());
    }

    #[test]
    fn health_state_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthState::HealthCheckFailed).unwrap(),
            "\"health_check_failed\""
        );
        assert_eq!(
            serde_json::to_string(&HealthState::Healthy).unwrap(),
            "\"healthy\""
        );
    }

    #[test]
    fn logs_are_trimmed_and_blank_lines_dropped() {
        let logs = GatewayLogs::from_raw("  first line  \n\n\t\nsecond\r\n   \nthird");
        assert_eq!(logs.logs, vec!["first line", "second", "third"]);
        assert!(logs.error.is_none());
    }

    #[test]
    fn missing_container_logs_sentinel() {
        let logs = GatewayLogs::container_not_found();
        assert!(logs.logs.is_empty());
        assert_eq!(logs.error.as_deref(), Some(CONTAINER_NOT_FOUND));
    }
}
