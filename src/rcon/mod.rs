//! Remote console (RCON) client.
//!
//! Sessions are never pooled: each `execute` connects, logs in, sends a single
//! command, reads its reply and closes the socket on every path.

pub mod client;
pub mod packet;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

pub use client::RconClient;

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Bounds the connect and the login/command exchange separately.
    pub timeout: Duration,
}

#[async_trait]
pub trait Console: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String>;
}
