//! Container runtime boundary.
//!
//! `ContainerRuntime` is the narrow set of calls the lifecycle manager and the
//! log broker make against the container engine. `DockerRuntime` implements it
//! on top of bollard; tests use an in-memory fake.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    NetworkingConfig, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

use super::spec::{ContainerSnapshot, ContainerSpec, ContainerStatus};
use crate::error::{ControlError, Result};

/// Combined stdout/stderr of a container, in follow mode.
pub type LogStream = BoxStream<'static, Result<Bytes>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fails with `NotFound` when no container has that name.
    async fn inspect(&self, name: &str) -> Result<ContainerSnapshot>;

    /// `AlreadyInState` when running, `NotFound` when absent.
    async fn start(&self, name: &str) -> Result<()>;

    /// `AlreadyInState` when not running, `NotFound` when absent.
    async fn stop(&self, name: &str) -> Result<()>;

    async fn remove(&self, name: &str) -> Result<()>;

    /// Pull `image` unless it is already present.
    async fn ensure_image(&self, image: &str) -> Result<()>;

    /// Create the bridge network unless it already exists.
    async fn ensure_network(&self, network: &str) -> Result<()>;

    /// Returns the runtime id of the new container.
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    /// Follow-mode log stream, starting from now.
    async fn logs(&self, name: &str) -> Result<LogStream>;
}

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    /// Verify Docker daemon is running and accessible
    pub async fn ping(&self) -> Result<()> {
        match tokio::time::timeout(Duration::from_secs(5), self.docker.ping()).await {
            Ok(Ok(_)) => {
                tracing::info!("Docker daemon accessible");
                Ok(())
            }
            Ok(Err(e)) => Err(ControlError::runtime(format!(
                "Docker daemon not accessible: {}",
                e
            ))),
            Err(_) => Err(ControlError::runtime("Docker ping timeout after 5 seconds")),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect(&self, name: &str) -> Result<ContainerSnapshot> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await?;

        let running = info.state.as_ref().and_then(|s| s.running);
        Ok(ContainerSnapshot {
            status: ContainerStatus::from_running_flag(running),
            id: info.id,
            image: info.config.and_then(|c| c.image),
        })
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.docker
            .stop_container(name, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                tracing::debug!("Image {} already available", image);
                return Ok(());
            }
            Err(e) => {
                let e = ControlError::from(e);
                if !matches!(e, ControlError::NotFound(_)) {
                    return Err(e);
                }
            }
        }

        tracing::info!("Pulling image: {}", image);
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::debug!("Image pull: {}", status);
                    }
                }
                Err(e) => {
                    return Err(ControlError::runtime(format!("Image pull failed: {}", e)));
                }
            }
        }

        tracing::info!("Image {} pulled successfully", image);
        Ok(())
    }

    async fn ensure_network(&self, network: &str) -> Result<()> {
        match self
            .docker
            .inspect_network(network, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => {
                let e = ControlError::from(e);
                if !matches!(e, ControlError::NotFound(_)) {
                    return Err(e);
                }
            }
        }

        tracing::info!("Creating network {}", network);
        let mut labels = HashMap::new();
        labels.insert("managed-by", "blockd");

        let options = CreateNetworkOptions {
            name: network,
            check_duplicate: true,
            driver: "bridge",
            attachable: true,
            labels,
            ..Default::default()
        };
        self.docker.create_network(options).await?;
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let mut port_bindings = HashMap::new();
        let mut exposed_ports = HashMap::new();

        for mapping in &spec.ports {
            port_bindings.insert(
                mapping.key(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(mapping.host_port.to_string()),
                }]),
            );
            exposed_ports.insert(mapping.key(), HashMap::new());
        }

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            binds: Some(vec![spec.bind()]),
            memory: spec.memory_limit_bytes,
            ..Default::default()
        };

        let mut endpoints = HashMap::new();
        endpoints.insert(spec.network.clone(), EndpointSettings::default());

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            networking_config: Some(NetworkingConfig {
                endpoints_config: endpoints,
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let created = self.docker.create_container(Some(options), config).await?;
        for warning in &created.warnings {
            tracing::warn!("Docker warning creating {}: {}", spec.name, warning);
        }
        Ok(created.id)
    }

    async fn logs(&self, name: &str) -> Result<LogStream> {
        // bollard only reports a missing container on the first poll
        self.inspect(name).await?;

        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: "0".to_string(),
            ..Default::default()
        };

        let stream = self.docker.logs(name, Some(options)).map(|item| {
            item.map(|output| match output {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message }
                | LogOutput::StdIn { message } => message,
            })
            .map_err(ControlError::from)
        });

        Ok(stream.boxed())
    }
}
