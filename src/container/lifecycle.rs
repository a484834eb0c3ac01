//! Lifecycle of the managed container: status, start, stop and recreate.
//!
//! Every mutating call holds the per-container lock for its whole duration.
//! The lock is taken with `try_lock`, so a mutation that arrives while another
//! one is in flight is rejected with `Busy` instead of being queued behind it.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, mpsc};

use super::runtime::ContainerRuntime;
use super::spec::{ContainerSnapshot, ContainerSpec, ContainerStatus, ProvisionSettings};
use crate::error::{ControlError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Starting(String),
    Started(String),
    Stopping(String),
    Stopped(String),
    RecreateStarted(String, String, String),
    StepSkipped(String, RecreateStep, String),
    Recreated(String, String),
    Error(String, String),
}

/// How a recreate step treats "already absent / already stopped" outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    TolerateAbsence,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateStep {
    Stop,
    Remove,
    PullImage,
    EnsureNetwork,
    Create,
    Start,
}

impl RecreateStep {
    pub const PIPELINE: [RecreateStep; 6] = [
        RecreateStep::Stop,
        RecreateStep::Remove,
        RecreateStep::PullImage,
        RecreateStep::EnsureNetwork,
        RecreateStep::Create,
        RecreateStep::Start,
    ];

    pub fn policy(&self) -> StepPolicy {
        match self {
            RecreateStep::Stop | RecreateStep::Remove => StepPolicy::TolerateAbsence,
            _ => StepPolicy::Strict,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecreateStep::Stop => "stop",
            RecreateStep::Remove => "remove",
            RecreateStep::PullImage => "pull-image",
            RecreateStep::EnsureNetwork => "ensure-network",
            RecreateStep::Create => "create",
            RecreateStep::Start => "start",
        }
    }
}

pub struct LifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    settings: ProvisionSettings,
    lock: Mutex<()>,
    event_tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl LifecycleManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        settings: ProvisionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tracing::info!("Lifecycle manager initialized for container {}", settings.name);

        (
            Self {
                runtime,
                settings,
                lock: Mutex::new(()),
                event_tx,
            },
            event_rx,
        )
    }

    pub fn container_name(&self) -> &str {
        &self.settings.name
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.event_tx.send(event);
    }

    fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .try_lock()
            .map_err(|_| ControlError::Busy(self.settings.name.clone()))
    }

    /// Re-queries the runtime; an absent container is not an error here.
    pub async fn inspect(&self) -> Result<ContainerSnapshot> {
        match self.runtime.inspect(&self.settings.name).await {
            Ok(snapshot) => Ok(snapshot),
            Err(ControlError::NotFound(_)) => Ok(ContainerSnapshot::absent()),
            Err(e) => Err(e),
        }
    }

    pub async fn status(&self) -> Result<ContainerStatus> {
        Ok(self.inspect().await?.status)
    }

    /// Fails with `AlreadyInState` when running and `NotFound` when absent.
    pub async fn start(&self) -> Result<()> {
        let _guard = self.acquire()?;
        let name = self.settings.name.clone();

        self.emit(LifecycleEvent::Starting(name.clone()));
        tracing::info!("Starting container: {}", name);

        match self.runtime.start(&name).await {
            Ok(()) => {
                self.emit(LifecycleEvent::Started(name.clone()));
                tracing::info!("Container started: {}", name);
                Ok(())
            }
            Err(e) => {
                self.fail(&name, &e);
                Err(e)
            }
        }
    }

    /// Fails with `AlreadyInState` when not running and `NotFound` when absent.
    pub async fn stop(&self) -> Result<()> {
        let _guard = self.acquire()?;
        let name = self.settings.name.clone();

        self.emit(LifecycleEvent::Stopping(name.clone()));
        tracing::info!("Stopping container: {}", name);

        match self.runtime.stop(&name).await {
            Ok(()) => {
                self.emit(LifecycleEvent::Stopped(name.clone()));
                tracing::info!("Container stopped: {}", name);
                Ok(())
            }
            Err(e) => {
                self.fail(&name, &e);
                Err(e)
            }
        }
    }

    /// Replace the container with one built for `version`/`variant`.
    ///
    /// Not transactional: if a strict step fails after `remove`, no container
    /// is left behind and `status()` reports `Absent`.
    pub async fn recreate(&self, version: &str, variant: &str) -> Result<String> {
        if version.trim().is_empty() || variant.trim().is_empty() {
            return Err(ControlError::InvalidRequest(
                "version and variant are required".to_string(),
            ));
        }

        let _guard = self.acquire()?;
        let name = self.settings.name.clone();
        let spec = self.settings.build_spec(version.trim(), variant.trim());

        self.emit(LifecycleEvent::RecreateStarted(
            name.clone(),
            version.to_string(),
            variant.to_string(),
        ));
        tracing::info!("Recreating {} with version {} / {}", name, version, variant);

        let mut container_id = None;
        for step in RecreateStep::PIPELINE {
            match self.run_step(step, &spec).await {
                Ok(id) => {
                    if id.is_some() {
                        container_id = id;
                    }
                }
                Err(e) if step.policy() == StepPolicy::TolerateAbsence && e.is_absence() => {
                    tracing::debug!("Recreate step {} skipped for {}: {}", step.name(), name, e);
                    self.emit(LifecycleEvent::StepSkipped(name.clone(), step, e.to_string()));
                }
                Err(e) => {
                    tracing::error!("Recreate step {} failed for {}: {}", step.name(), name, e);
                    self.fail(&name, &e);
                    return Err(e);
                }
            }
        }

        let container_id = container_id.unwrap_or_default();
        self.emit(LifecycleEvent::Recreated(name.clone(), container_id.clone()));
        tracing::info!("Container {} recreated ({})", name, container_id);
        Ok(container_id)
    }

    async fn run_step(&self, step: RecreateStep, spec: &ContainerSpec) -> Result<Option<String>> {
        match step {
            RecreateStep::Stop => self.runtime.stop(&spec.name).await.map(|_| None),
            RecreateStep::Remove => self.runtime.remove(&spec.name).await.map(|_| None),
            RecreateStep::PullImage => self.runtime.ensure_image(&spec.image).await.map(|_| None),
            RecreateStep::EnsureNetwork => {
                self.runtime.ensure_network(&spec.network).await.map(|_| None)
            }
            RecreateStep::Create => self.runtime.create(spec).await.map(Some),
            RecreateStep::Start => self.runtime.start(&spec.name).await.map(|_| None),
        }
    }

    fn fail(&self, name: &str, e: &ControlError) {
        self.emit(LifecycleEvent::Error(name.to_string(), e.to_string()));
    }
}
