//! Fan-out of the managed container's log stream to live observers.
//!
//! Every observer gets its own follow-mode subscription against the runtime
//! and its own forwarding task. Closing one subscription cancels only that
//! task and drops only that stream.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::container::{ContainerRuntime, LogStream};

pub const STREAM_END_MESSAGE: &str = "--- Logs finished ---";

/// One text frame sent to an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum LogFrame {
    #[serde(rename = "log")]
    Output(String),
    /// Terminal message; nothing follows it.
    #[serde(rename = "diagnostic")]
    Diagnostic(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LogObserver {
    pub id: Uuid,
    pub attached_at: DateTime<Utc>,
}

pub struct LogBroker {
    runtime: Arc<dyn ContainerRuntime>,
    container_name: String,
    observers: Arc<DashMap<Uuid, LogObserver>>,
}

/// Handle for one attached observer.
pub struct LogSubscription {
    id: Uuid,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    observers: Arc<DashMap<Uuid, LogObserver>>,
}

impl LogSubscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tear down this observer's stream. Safe to call after the stream ended.
    pub async fn close(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.observers.remove(&self.id);
        tracing::debug!("Log observer {} closed", self.id);
    }
}

impl LogBroker {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container_name: String) -> Self {
        Self {
            runtime,
            container_name,
            observers: Arc::new(DashMap::new()),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Snapshot of the live observers, oldest first.
    pub fn observers(&self) -> Vec<LogObserver> {
        let mut observers: Vec<LogObserver> =
            self.observers.iter().map(|entry| entry.value().clone()).collect();
        observers.sort_by_key(|observer| observer.attached_at);
        observers
    }

    /// Open a follow-mode stream for a new observer and start forwarding it to
    /// `sink`. If the stream cannot be opened the observer receives a single
    /// diagnostic frame and the returned subscription is already finished.
    pub async fn attach(&self, sink: mpsc::Sender<LogFrame>) -> LogSubscription {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        let stream = match self.runtime.logs(&self.container_name).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Log stream for {} unavailable: {}", self.container_name, e);
                let _ = sink.send(LogFrame::Diagnostic(format!("Error: {}", e))).await;
                return LogSubscription {
                    id,
                    token,
                    task: None,
                    observers: self.observers.clone(),
                };
            }
        };

        self.observers.insert(
            id,
            LogObserver {
                id,
                attached_at: Utc::now(),
            },
        );
        tracing::info!(
            "Log observer {} attached to {} ({} live)",
            id,
            self.container_name,
            self.observer_count()
        );

        let task = tokio::spawn(forward(
            stream,
            sink,
            token.clone(),
            id,
            self.observers.clone(),
        ));

        LogSubscription {
            id,
            token,
            task: Some(task),
            observers: self.observers.clone(),
        }
    }
}

async fn forward(
    mut stream: LogStream,
    sink: mpsc::Sender<LogFrame>,
    token: CancellationToken,
    id: Uuid,
    observers: Arc<DashMap<Uuid, LogObserver>>,
) {
    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            next = stream.next() => match next {
                Some(Ok(chunk)) => LogFrame::Output(String::from_utf8_lossy(&chunk).into_owned()),
                Some(Err(e)) => {
                    tracing::error!("Log stream error for observer {}: {}", id, e);
                    LogFrame::Diagnostic(format!("Error: {}", e))
                }
                None => LogFrame::Diagnostic(STREAM_END_MESSAGE.to_string()),
            }
        };

        let terminal = matches!(frame, LogFrame::Diagnostic(_));
        // A full queue must not keep a cancelled observer alive.
        let delivered = tokio::select! {
            _ = token.cancelled() => false,
            sent = sink.send(frame) => sent.is_ok(),
        };
        if terminal || !delivered {
            break;
        }
    }

    if token.is_cancelled() {
        tracing::debug!("Log observer {} detached", id);
    }
    drop(stream);
    observers.remove(&id);
}
