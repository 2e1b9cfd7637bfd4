//! Docker Engine Adapter
//!
//! [`ContainerRuntime`] over the local Docker daemon.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use chrono::{DateTime, Datelike, Utc};
use futures::StreamExt;

use crate::application::ports::{ContainerInfo, ContainerRuntime, ContainerSpec, RuntimeError};

/// Container runtime backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Wrap an existing client.
    #[must_use]
    pub const fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket).
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be configured.
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| RuntimeError::Connection {
            message: e.to_string(),
        })?;
        Ok(Self::new(docker))
    }
}

fn map_error(name: &str, error: bollard::errors::Error) -> RuntimeError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(name.to_string()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api {
            status: Some(status_code),
            message,
        },
        other => RuntimeError::Connection {
            message: other.to_string(),
        },
    }
}

/// Docker reports unset timestamps as the zero time.
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw?).ok()?.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}

fn create_config(spec: &ContainerSpec) -> Config<String> {
    let env = spec
        .env
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    let mut exposed_ports = HashMap::new();
    let mut port_bindings = HashMap::new();
    for port in &spec.ports {
        let key = format!("{port}/tcp");
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(port.to_string()),
            }]),
        );
    }

    let restart_policy = spec.restart_unless_stopped.then(|| RestartPolicy {
        name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
        maximum_retry_count: None,
    });

    Config {
        image: Some(spec.image.clone()),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings),
            restart_policy,
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerInfo>, RuntimeError> {
        let response = match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return match map_error(name, e) {
                    RuntimeError::NotFound(_) => Ok(None),
                    other => Err(other),
                };
            }
        };

        let state = response.state.unwrap_or_default();
        Ok(Some(ContainerInfo {
            id: response.id.unwrap_or_default(),
            status: state
                .status
                .map_or_else(|| "unknown".to_string(), |s| s.to_string()),
            running: state.running.unwrap_or(false),
            created_at: parse_timestamp(response.created.as_deref()),
            started_at: parse_timestamp(state.started_at.as_deref()),
            finished_at: parse_timestamp(state.finished_at.as_deref()),
        }))
    }

    async fn pull_image(&self, image: &str) -> Result<(), RuntimeError> {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(step) = progress.next().await {
            step.map_err(|e| map_error(image, e))?;
        }
        tracing::debug!(image, "Pulled gateway image");
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), create_config(spec))
            .await
            .map_err(|e| map_error(&spec.name, e))?;

        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, warning, "Docker create warning");
        }
        Ok(response.id)
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_error(name, e))
    }

    async fn stop(&self, name: &str, timeout: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
        };
        match self.docker.stop_container(name, Some(options)).await {
            // 304: already stopped
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            })
            | Ok(()) => Ok(()),
            Err(e) => Err(map_error(name, e)),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| map_error(name, e))
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_error(name, e))?;
            output.push_str(&chunk.to_string());
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "ibkr-gateway".to_string(),
            image: "ghcr.io/extrange/ibkr:stable".to_string(),
            env: BTreeMap::from([
                ("IBC_TradingMode".to_string(), "paper".to_string()),
                ("USERNAME".to_string(), "trader".to_string()),
            ]),
            ports: vec![6080, 8888, 7462],
            restart_unless_stopped: true,
        }
    }

    #[test]
    fn config_binds_each_port_to_itself() {
        let config = create_config(&spec());

        let bindings = config.host_config.unwrap().port_bindings.unwrap();
        assert_eq!(bindings.len(), 3);
        let api = bindings["8888/tcp"].as_ref().unwrap();
        assert_eq!(api[0].host_port.as_deref(), Some("8888"));
        assert!(config.exposed_ports.unwrap().contains_key("7462/tcp"));
    }

    #[test]
    fn config_carries_env_and_restart_policy() {
        let spec = spec();
        let config = create_config(&spec);

        let env = config.env.unwrap();
        assert!(env.contains(&"IBC_TradingMode=paper".to_string()));
        assert_eq!(
            config.host_config.unwrap().restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
    }

    #[test]
    fn zero_timestamps_are_unset() {
        assert!(parse_timestamp(Some("0001-01-01T00:00:00Z")).is_none());
        assert!(parse_timestamp(None).is_none());
        let parsed = parse_timestamp(Some("2024-01-15T14:30:05.123456789Z")).unwrap();
        assert_eq!(parsed.year(), 2024);
    }

    #[test]
    fn missing_container_maps_to_not_found() {
        let err = map_error(
            "ibkr-gateway",
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message: "No such container".to_string(),
            },
        );
        assert!(err.is_not_found());

        let err = map_error(
            "ibkr-gateway",
            bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "boom".to_string(),
            },
        );
        assert!(matches!(err, RuntimeError::Api { status: Some(500), .. }));
    }
}
