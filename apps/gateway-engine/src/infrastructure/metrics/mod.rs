//! Prometheus Metrics Module
//!
//! Exposes gateway engine metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Probes**: Liveness probe outcomes and rate-limit waits
//! - **Lifecycle**: Container lifecycle transitions
//! - **Session**: Trading-API session connects
//! - **Market data**: Self-heal restarts and snapshot stabilization outcomes

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::gateway::GatewayProcessState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "gateway_engine_probes_total",
        "Liveness probes against the gateway trading-API port by outcome"
    );
    describe_histogram!(
        "gateway_engine_probe_wait_seconds",
        "Time a caller waited for the probe rate limit"
    );
    describe_counter!(
        "gateway_engine_lifecycle_transitions_total",
        "Gateway process state transitions by target state"
    );
    describe_counter!(
        "gateway_engine_session_connects_total",
        "Trading-API session connection attempts by outcome"
    );
    describe_counter!(
        "gateway_engine_self_heal_restarts_total",
        "Gateway restarts triggered by missing option greeks"
    );
    describe_counter!(
        "gateway_engine_snapshots_total",
        "Single-symbol snapshot stabilization outcomes"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for connection-like operations.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    const fn from_bool(ok: bool) -> Self {
        if ok { Self::Success } else { Self::Failure }
    }
}

/// Snapshot stabilization outcome label.
#[derive(Debug, Clone, Copy)]
pub enum SnapshotOutcome {
    /// A timestamped value arrived.
    Value,
    /// Consecutive-timeout limit reached.
    ConsecutiveTimeouts,
    /// Overall deadline reached.
    Deadline,
    /// The vendor closed the update stream.
    StreamClosed,
}

impl SnapshotOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::ConsecutiveTimeouts => "consecutive_timeouts",
            Self::Deadline => "deadline",
            Self::StreamClosed => "stream_closed",
        }
    }
}

/// Record a probe result.
pub fn record_probe(healthy: bool) {
    counter!(
        "gateway_engine_probes_total",
        "outcome" => Outcome::from_bool(healthy).as_str()
    )
    .increment(1);
}

/// Record time spent waiting for the probe rate limit.
pub fn record_probe_wait(waited: Duration) {
    histogram!("gateway_engine_probe_wait_seconds").record(waited.as_secs_f64());
}

/// Record a gateway process state transition.
pub fn record_transition(state: GatewayProcessState) {
    counter!(
        "gateway_engine_lifecycle_transitions_total",
        "state" => state.as_str()
    )
    .increment(1);
}

/// Record a trading-API session connection attempt.
pub fn record_session_connect(connected: bool) {
    counter!(
        "gateway_engine_session_connects_total",
        "outcome" => Outcome::from_bool(connected).as_str()
    )
    .increment(1);
}

/// Record a self-heal restart.
pub fn record_self_heal_restart() {
    counter!("gateway_engine_self_heal_restarts_total").increment(1);
}

/// Record a snapshot stabilization outcome.
pub fn record_snapshot(outcome: SnapshotOutcome) {
    counter!(
        "gateway_engine_snapshots_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
