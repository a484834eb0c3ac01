use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::container::spec::ProvisionSettings;
use crate::error::{ControlError, Result};
use crate::rcon::ConsoleSettings;

pub const ENV_CONTAINER_NAME: &str = "MINECRAFT_CONTAINER_NAME";
pub const ENV_RCON_HOST: &str = "MINECRAFT_RCON_HOST";
pub const ENV_RCON_PORT: &str = "MINECRAFT_RCON_PORT";
pub const ENV_RCON_PASSWORD: &str = "MINECRAFT_RCON_PASSWORD";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `None` allows any origin.
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub network: String,
    pub volume: String,
    pub data_dir: String,
    pub game_port: u16,
    pub host_game_port: u16,
    pub host_console_port: u16,
    /// Value of the `TYPE` variable handed to the server image (FORGE, FABRIC...).
    pub server_type: String,
    /// Environment variable that receives the loader/variant version.
    pub variant_env: String,
    /// JVM heap, passed through as `MEMORY`.
    pub memory: String,
    /// Hard memory ceiling for the container, in bytes.
    pub memory_limit_bytes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub host: String,
    pub port: Option<u16>,
    pub password: String,
    pub timeout_ms: u64,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            container: ContainerConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: Some("http://localhost:8080".to_string()),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: "itzg/minecraft-server:stable-java21-jdk".to_string(),
            network: "proyectominecraft_minecraft-net".to_string(),
            volume: "minecraft-data".to_string(),
            data_dir: "/data".to_string(),
            game_port: 25565,
            host_game_port: 25565,
            host_console_port: 25575,
            server_type: "FORGE".to_string(),
            variant_env: "FORGE_VERSION".to_string(),
            memory: "4G".to_string(),
            memory_limit_bytes: None,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            password: String::new(),
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Load the config file if present, then apply environment overrides and
    /// validate. Missing required values are fatal.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| ControlError::Config(format!("failed to read {}: {}", path, e)))?;
            serde_json::from_str::<Config>(&content)
                .map_err(|e| ControlError::Config(format!("failed to parse {}: {}", path, e)))?
        } else {
            tracing::warn!("{} not found, using defaults and environment", path);
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_CONTAINER_NAME) {
            self.container.name = name;
        }
        if let Some(host) = lookup(ENV_RCON_HOST) {
            self.console.host = host;
        }
        if let Some(port) = lookup(ENV_RCON_PORT) {
            let port = port.trim().parse::<u16>().map_err(|_| {
                ControlError::Config(format!("{} is not a valid port: {}", ENV_RCON_PORT, port))
            })?;
            self.console.port = Some(port);
        }
        if let Some(password) = lookup(ENV_RCON_PASSWORD) {
            self.console.password = password;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.container.name.trim().is_empty() {
            missing.push("container.name");
        }
        if self.console.host.trim().is_empty() {
            missing.push("console.host");
        }
        if self.console.port.is_none() {
            missing.push("console.port");
        }
        if self.console.password.is_empty() {
            missing.push("console.password");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ControlError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn console_settings(&self) -> Result<ConsoleSettings> {
        let port = self
            .console
            .port
            .ok_or_else(|| ControlError::Config("console.port is not set".to_string()))?;
        Ok(ConsoleSettings {
            host: self.console.host.clone(),
            port,
            password: self.console.password.clone(),
            timeout: std::time::Duration::from_millis(self.console.timeout_ms),
        })
    }

    pub fn provision_settings(&self) -> Result<ProvisionSettings> {
        let console_port = self
            .console
            .port
            .ok_or_else(|| ControlError::Config("console.port is not set".to_string()))?;
        let c = &self.container;
        Ok(ProvisionSettings {
            name: c.name.clone(),
            image: c.image.clone(),
            network: c.network.clone(),
            volume: c.volume.clone(),
            data_dir: c.data_dir.clone(),
            game_port: c.game_port,
            host_game_port: c.host_game_port,
            console_port,
            host_console_port: c.host_console_port,
            console_password: self.console.password.clone(),
            server_type: c.server_type.clone(),
            variant_env: c.variant_env.clone(),
            memory: c.memory.clone(),
            memory_limit_bytes: c.memory_limit_bytes,
        })
    }
}
