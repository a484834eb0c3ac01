use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::packet::{
    AUTH_FAILED_ID, MAX_COMMAND_LEN, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
    SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};
use super::{Console, ConsoleSettings};
use crate::error::{ControlError, Result};

/// One connection, one login, one command, one reply.
struct RconSession {
    stream: TcpStream,
    next_id: i32,
}

impl RconSession {
    async fn connect(settings: &ConsoleSettings) -> Result<Self> {
        let addr = (settings.host.as_str(), settings.port);
        let stream = match timeout(settings.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ControlError::unavailable(format!(
                    "cannot connect to {}:{}: {}",
                    settings.host, settings.port, e
                )));
            }
            Err(_) => {
                return Err(ControlError::unavailable(format!(
                    "timed out connecting to {}:{}",
                    settings.host, settings.port
                )));
            }
        };
        let _ = stream.set_nodelay(true);

        Ok(Self { stream, next_id: 1 })
    }

    fn request_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    async fn authenticate(&mut self, password: &str) -> Result<()> {
        let id = self.request_id();
        Packet::new(id, SERVERDATA_AUTH, password)
            .write_to(&mut self.stream)
            .await?;

        loop {
            let reply = Packet::read_from(&mut self.stream).await?;
            if reply.kind != SERVERDATA_AUTH_RESPONSE {
                // some servers send an empty RESPONSE_VALUE first
                continue;
            }
            if reply.id == AUTH_FAILED_ID {
                return Err(ControlError::ProtocolAuthFailure);
            }
            if reply.id == id {
                return Ok(());
            }
            return Err(ControlError::unavailable(format!(
                "unexpected auth response id {}",
                reply.id
            )));
        }
    }

    /// Long replies arrive split over several packets. A trailing empty
    /// RESPONSE_VALUE with its own id is echoed back by the server only after
    /// every fragment of the command's reply, so it marks the end.
    async fn send(&mut self, command: &str) -> Result<String> {
        let id = self.request_id();
        let sentinel = self.request_id();
        Packet::new(id, SERVERDATA_EXECCOMMAND, command)
            .write_to(&mut self.stream)
            .await?;
        Packet::new(sentinel, SERVERDATA_RESPONSE_VALUE, "")
            .write_to(&mut self.stream)
            .await?;

        let mut reply = String::new();
        loop {
            let packet = Packet::read_from(&mut self.stream).await?;
            if packet.id == sentinel {
                return Ok(reply);
            }
            if packet.kind == SERVERDATA_RESPONSE_VALUE && packet.id == id {
                reply.push_str(&packet.body);
                continue;
            }
            tracing::debug!("Ignoring console packet id={} type={}", packet.id, packet.kind);
        }
    }

    async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

pub struct RconClient {
    settings: ConsoleSettings,
}

impl RconClient {
    pub fn new(settings: ConsoleSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Console for RconClient {
    async fn execute(&self, command: &str) -> Result<String> {
        if command.trim().is_empty() {
            return Err(ControlError::InvalidRequest("command is empty".to_string()));
        }
        if command.len() > MAX_COMMAND_LEN {
            return Err(ControlError::InvalidRequest(format!(
                "command longer than {} bytes",
                MAX_COMMAND_LEN
            )));
        }

        let mut session = RconSession::connect(&self.settings).await?;

        let exchange = async {
            session.authenticate(&self.settings.password).await?;
            session.send(command).await
        };
        let result = match timeout(self.settings.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ControlError::unavailable("console did not reply in time")),
        };

        session.close().await;

        match &result {
            Ok(_) => tracing::debug!("Console command ok: {}", command),
            Err(e) => tracing::warn!("Console command failed ({}): {}", command, e),
        }
        result
    }
}
