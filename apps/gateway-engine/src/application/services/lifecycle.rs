//! Container Lifecycle Controller
//!
//! Creates, adopts, stops and inspects the gateway container, and owns the
//! gateway process state. Read operations never fail: problems are reported
//! inside the returned record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::health_gate::HealthCheckGate;
use crate::application::ports::{
    ContainerInfo, ContainerRuntime, ContainerSpec, GatewayProbe, RuntimeError,
};
use crate::domain::gateway::{
    ContainerStatus, GatewayLogs, GatewayProcessState, HealthState, LifecycleEvent,
};
use crate::error::GatewayError;
use crate::infrastructure::config::HealthSettings;
use crate::infrastructure::metrics;

/// Lifecycle controller for the gateway container.
pub struct GatewayLifecycle<R: ContainerRuntime, P: GatewayProbe> {
    runtime: Arc<R>,
    probe: Arc<P>,
    gate: HealthCheckGate,
    spec: ContainerSpec,
    health: HealthSettings,
    stop_timeout: Duration,
    state: Mutex<GatewayProcessState>,
}

impl<R: ContainerRuntime, P: GatewayProbe> GatewayLifecycle<R, P> {
    /// Create a controller for the container described by `spec`.
    #[must_use]
    pub fn new(
        runtime: Arc<R>,
        probe: Arc<P>,
        spec: ContainerSpec,
        health: HealthSettings,
        stop_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            probe,
            gate: HealthCheckGate::new(health.interval),
            spec,
            health,
            stop_timeout,
            state: Mutex::new(GatewayProcessState::Absent),
        }
    }

    /// Current process state.
    #[must_use]
    pub fn state(&self) -> GatewayProcessState {
        *self.state.lock()
    }

    /// Well-known container name.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.spec.name
    }

    fn apply(&self, event: LifecycleEvent) -> GatewayProcessState {
        let mut state = self.state.lock();
        let previous = *state;
        *state = previous.on(event);
        if *state != previous {
            tracing::debug!(from = %previous, to = %*state, ?event, "Gateway state transition");
            metrics::record_transition(*state);
        }
        *state
    }

    fn restore(&self, state: GatewayProcessState) {
        *self.state.lock() = state;
    }

    // =========================================================================
    // Start / Stop
    // =========================================================================

    /// Ensure the gateway container is running and answering.
    ///
    /// Adopts a running container without restarting it. Otherwise replaces
    /// any stale container with a fresh one and waits for readiness. Returns
    /// `Ok(false)` if readiness timed out; the container is left running.
    ///
    /// # Errors
    ///
    /// Returns an error if the container runtime fails.
    pub async fn start(&self) -> Result<bool, GatewayError> {
        let name = self.spec.name.as_str();

        match self.runtime.inspect(name).await? {
            Some(info) if info.running => {
                tracing::info!(container = name, id = %info.id, "Gateway container already running");
                self.apply(LifecycleEvent::Adopted);
                return Ok(true);
            }
            Some(info) => {
                tracing::info!(
                    container = name,
                    status = %info.status,
                    "Removing stale gateway container"
                );
                tolerate_not_found(self.runtime.remove(name).await)?;
            }
            None => {}
        }

        self.apply(LifecycleEvent::StartRequested);
        if let Err(e) = self.create_and_start().await {
            self.apply(LifecycleEvent::StartFailed);
            return Err(e);
        }

        if self.wait_until_ready().await {
            tracing::info!(container = name, "Gateway ready");
            Ok(true)
        } else {
            tracing::error!(
                container = name,
                timeout_secs = self.health.ready_timeout.as_secs(),
                "Gateway not ready before timeout; container left running"
            );
            self.apply(LifecycleEvent::ReadyTimedOut);
            Ok(false)
        }
    }

    async fn create_and_start(&self) -> Result<(), GatewayError> {
        let name = self.spec.name.as_str();

        if let Err(e) = self.runtime.pull_image(&self.spec.image).await {
            tracing::warn!(image = %self.spec.image, error = %e, "Image pull failed, using cached image");
        }

        let id = self.runtime.create(&self.spec).await?;
        tracing::debug!(container = name, %id, "Gateway container created");
        self.runtime.start(name).await?;
        tracing::info!(container = name, "Gateway container started");
        Ok(())
    }

    /// Poll the probe until it succeeds or the readiness timeout elapses.
    pub async fn wait_until_ready(&self) -> bool {
        let started = Instant::now();
        loop {
            if self.gate.probe(self.probe.as_ref()).await {
                self.apply(LifecycleEvent::ProbeSucceeded);
                tracing::debug!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Gateway answered probe"
                );
                return true;
            }
            if started.elapsed() >= self.health.ready_timeout {
                return false;
            }
            tokio::time::sleep(self.health.ready_poll_interval).await;
        }
    }

    /// Stop and remove the gateway container.
    ///
    /// With `persist` the container is intentionally left running and this
    /// is a no-op. A container that is already gone counts as stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the container runtime fails.
    pub async fn stop(&self, persist: bool) -> Result<bool, GatewayError> {
        let name = self.spec.name.as_str();
        if persist {
            tracing::info!(container = name, "Persisting gateway container");
            return Ok(true);
        }

        let previous = self.state();
        self.apply(LifecycleEvent::StopRequested);

        let result = async {
            tolerate_not_found(self.runtime.stop(name, self.stop_timeout).await)?;
            tolerate_not_found(self.runtime.remove(name).await)
        }
        .await;

        match result {
            Ok(()) => {
                self.apply(LifecycleEvent::Removed);
                tracing::info!(container = name, "Gateway container stopped and removed");
                Ok(true)
            }
            Err(e) => {
                self.restore(previous);
                tracing::error!(container = name, error = %e, "Failed to stop gateway container");
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Status / Logs
    // =========================================================================

    /// Point-in-time container status, probing health if it is running.
    pub async fn get_status(&self) -> ContainerStatus {
        let name = self.spec.name.as_str();
        let info = match self.runtime.inspect(name).await {
            Ok(Some(info)) => info,
            Ok(None) => return ContainerStatus::not_found(),
            Err(e) => {
                tracing::error!(container = name, error = %e, "Failed to inspect gateway container");
                return ContainerStatus::error(e.to_string());
            }
        };

        let health = if info.running {
            self.check_health().await
        } else {
            HealthState::Unknown
        };

        status_from_info(info, health, Utc::now())
    }

    async fn check_health(&self) -> HealthState {
        let deadline = self.health.ready_timeout;
        match tokio::time::timeout(deadline, self.gate.probe(self.probe.as_ref())).await {
            Ok(true) => {
                self.apply(LifecycleEvent::ProbeSucceeded);
                HealthState::Healthy
            }
            Ok(false) => {
                self.apply(LifecycleEvent::ProbeFailed);
                HealthState::Unhealthy
            }
            Err(_) => {
                tracing::warn!(timeout_secs = deadline.as_secs(), "Health check did not complete");
                HealthState::HealthCheckFailed
            }
        }
    }

    /// Last `tail` lines of container output as trimmed, non-empty lines.
    pub async fn get_logs(&self, tail: usize) -> GatewayLogs {
        match self.runtime.logs(&self.spec.name, tail).await {
            Ok(raw) => GatewayLogs::from_raw(&raw),
            Err(e) if e.is_not_found() => GatewayLogs::container_not_found(),
            Err(e) => {
                tracing::error!(container = %self.spec.name, error = %e, "Failed to read gateway logs");
                GatewayLogs::failed(e.to_string())
            }
        }
    }
}

fn tolerate_not_found(result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!(error = %e, "Container already gone");
            Ok(())
        }
        other => other,
    }
}

fn status_from_info(info: ContainerInfo, health: HealthState, now: DateTime<Utc>) -> ContainerStatus {
    let age_seconds = info
        .created_at
        .map(|created| (now - created).num_milliseconds() as f64 / 1000.0);

    ContainerStatus {
        status: info.status,
        health,
        created_at: info.created_at,
        started_at: info.started_at,
        finished_at: info.finished_at,
        age_seconds,
        error: None,
    }
}
