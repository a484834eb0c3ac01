//! In-memory `ContainerRuntime` with Docker's status-code semantics.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::runtime::{ContainerRuntime, LogStream};
use super::spec::{ContainerSnapshot, ContainerSpec, ContainerStatus};
use crate::error::{ControlError, Result};

struct FakeContainer {
    id: String,
    image: String,
    running: bool,
    spec: Option<ContainerSpec>,
}

#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, FakeContainer>>,
    feeds: Mutex<HashMap<String, broadcast::Sender<Bytes>>>,
    fail_create: AtomicBool,
    fail_pull: AtomicBool,
    pub creates: AtomicUsize,
    pub log_opens: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(name: &str, running: bool) -> Self {
        let runtime = Self::new();
        runtime.containers.lock().unwrap().insert(
            name.to_string(),
            FakeContainer {
                id: format!("id-{}", name),
                image: "old-image".to_string(),
                running,
                spec: None,
            },
        );
        runtime
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pull(&self, fail: bool) {
        self.fail_pull.store(fail, Ordering::SeqCst);
    }

    pub fn spec_of(&self, name: &str) -> Option<ContainerSpec> {
        self.containers
            .lock()
            .unwrap()
            .get(name)
            .and_then(|c| c.spec.clone())
    }

    /// Push a chunk to every open log stream of `name`.
    pub fn emit(&self, name: &str, chunk: &str) {
        if let Some(tx) = self.feeds.lock().unwrap().get(name) {
            let _ = tx.send(Bytes::from(chunk.to_string()));
        }
    }

    /// End every open log stream of `name`.
    pub fn end_logs(&self, name: &str) {
        self.feeds.lock().unwrap().remove(name);
    }

    pub fn open_feeds(&self, name: &str) -> usize {
        self.feeds
            .lock()
            .unwrap()
            .get(name)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

fn not_found(name: &str) -> ControlError {
    ControlError::NotFound(format!("No such container: {}", name))
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn inspect(&self, name: &str) -> Result<ContainerSnapshot> {
        let containers = self.containers.lock().unwrap();
        let c = containers.get(name).ok_or_else(|| not_found(name))?;
        Ok(ContainerSnapshot {
            status: ContainerStatus::from_running_flag(Some(c.running)),
            id: Some(c.id.clone()),
            image: Some(c.image.clone()),
        })
    }

    async fn start(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let c = containers.get_mut(name).ok_or_else(|| not_found(name))?;
        if c.running {
            return Err(ControlError::AlreadyInState("started".to_string()));
        }
        c.running = true;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let c = containers.get_mut(name).ok_or_else(|| not_found(name))?;
        if !c.running {
            return Err(ControlError::AlreadyInState("stopped".to_string()));
        }
        c.running = false;
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.containers
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(ControlError::runtime(format!("pull access denied for {}", image)));
        }
        Ok(())
    }

    async fn ensure_network(&self, _network: &str) -> Result<()> {
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        // let concurrent callers interleave here
        tokio::task::yield_now().await;

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ControlError::runtime("create failed"));
        }

        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(&spec.name) {
            return Err(ControlError::runtime(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }

        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("id-{}-{}", spec.name, n);
        containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                image: spec.image.clone(),
                running: false,
                spec: Some(spec.clone()),
            },
        );
        Ok(id)
    }

    async fn logs(&self, name: &str) -> Result<LogStream> {
        if !self.containers.lock().unwrap().contains_key(name) {
            return Err(not_found(name));
        }
        self.log_opens.fetch_add(1, Ordering::SeqCst);

        let rx = self
            .feeds
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .subscribe();

        let stream = BroadcastStream::new(rx)
            .filter_map(|item| futures::future::ready(item.ok().map(Ok)));
        Ok(stream.boxed())
    }
}
