//! In-memory container runtime.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::application::ports::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    spec: Option<ContainerSpec>,
    running: bool,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Call counters of an [`InMemoryContainerRuntime`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeCalls {
    /// `pull_image` calls.
    pub pulls: usize,
    /// `create` calls.
    pub creates: usize,
    /// `start` calls.
    pub starts: usize,
    /// `stop` calls.
    pub stops: usize,
    /// `remove` calls.
    pub removes: usize,
}

#[derive(Debug, Default)]
struct State {
    containers: HashMap<String, FakeContainer>,
    calls: RuntimeCalls,
    next_id: u64,
    pull_failure: Option<RuntimeError>,
    create_failure: Option<RuntimeError>,
    stop_failure: Option<RuntimeError>,
    logs: String,
}

/// Container runtime that keeps containers in a map.
///
/// Suitable for testing. Containers never run anything.
#[derive(Debug, Default)]
pub struct InMemoryContainerRuntime {
    state: Mutex<State>,
}

impl InMemoryContainerRuntime {
    /// Create a runtime with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing container (for test setup).
    pub fn add_container(&self, name: &str, running: bool) {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        let now = Utc::now();
        state.containers.insert(
            name.to_string(),
            FakeContainer {
                id,
                spec: None,
                running,
                created_at: now,
                started_at: running.then_some(now),
                finished_at: (!running).then_some(now),
            },
        );
    }

    /// Remove a container behind the engine's back.
    pub fn vanish(&self, name: &str) {
        self.state.lock().containers.remove(name);
    }

    /// Fail image pulls with `error`.
    pub fn fail_pulls(&self, error: Option<RuntimeError>) {
        self.state.lock().pull_failure = error;
    }

    /// Fail container creation with `error`.
    pub fn fail_creates(&self, error: Option<RuntimeError>) {
        self.state.lock().create_failure = error;
    }

    /// Fail container stops with `error`.
    pub fn fail_stops(&self, error: Option<RuntimeError>) {
        self.state.lock().stop_failure = error;
    }

    /// Raw log output returned for every container.
    pub fn set_logs(&self, logs: impl Into<String>) {
        self.state.lock().logs = logs.into();
    }

    /// Whether a container with `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().containers.contains_key(name)
    }

    /// Whether the container with `name` is running.
    #[must_use]
    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .containers
            .get(name)
            .is_some_and(|c| c.running)
    }

    /// Spec the container was created from.
    #[must_use]
    pub fn spec_of(&self, name: &str) -> Option<ContainerSpec> {
        self.state
            .lock()
            .containers
            .get(name)
            .and_then(|c| c.spec.clone())
    }

    /// Call counters so far.
    #[must_use]
    pub fn calls(&self) -> RuntimeCalls {
        self.state.lock().calls
    }
}

fn not_found(name: &str) -> RuntimeError {
    RuntimeError::NotFound(name.to_string())
}

#[async_trait]
impl ContainerRuntime for InMemoryContainerRuntime {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let state = self.state.lock();
        Ok(state.containers.get(name).map(|c| ContainerInfo {
            id: c.id.clone(),
            status: if c.running { "running" } else { "exited" }.to_string(),
            running: c.running,
            created_at: Some(c.created_at),
            started_at: c.started_at,
            finished_at: c.finished_at,
        }))
    }

    async fn pull_image(&self, _image: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        state.calls.pulls += 1;
        state.pull_failure.clone().map_or(Ok(()), Err)
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mut state = self.state.lock();
        state.calls.creates += 1;
        if let Some(error) = state.create_failure.clone() {
            return Err(error);
        }
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::Api {
                status: Some(409),
                message: format!("container name {} is already in use", spec.name),
            });
        }

        state.next_id += 1;
        let id = format!("{:012x}", state.next_id);
        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                spec: Some(spec.clone()),
                running: false,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
            },
        );
        Ok(id)
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        state.calls.starts += 1;
        let container = state.containers.get_mut(name).ok_or_else(|| not_found(name))?;
        container.running = true;
        container.started_at = Some(Utc::now());
        Ok(())
    }

    async fn stop(&self, name: &str, _timeout: Duration) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        state.calls.stops += 1;
        if let Some(error) = state.stop_failure.clone() {
            return Err(error);
        }
        let container = state.containers.get_mut(name).ok_or_else(|| not_found(name))?;
        container.running = false;
        container.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        state.calls.removes += 1;
        state
            .containers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let state = self.state.lock();
        if !state.containers.contains_key(name) {
            return Err(not_found(name));
        }
        let lines: Vec<&str> = state.logs.lines().collect();
        let skip = lines.len().saturating_sub(tail);
        Ok(lines[skip..].join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logs_are_tailed() {
        let runtime = InMemoryContainerRuntime::new();
        runtime.add_container("gw", true);
        runtime.set_logs("one\ntwo\nthree");

        assert_eq!(runtime.logs("gw", 2).await.unwrap(), "two\nthree");
        assert!(runtime.logs("other", 2).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn missing_container_operations_are_not_found() {
        let runtime = InMemoryContainerRuntime::new();

        assert!(runtime.inspect("gw").await.unwrap().is_none());
        assert!(runtime.start("gw").await.unwrap_err().is_not_found());
        assert!(runtime.stop("gw", Duration::from_secs(1)).await.unwrap_err().is_not_found());
        assert!(runtime.remove("gw").await.unwrap_err().is_not_found());
        assert_eq!(runtime.calls().removes, 1);
    }
}
