use serde::{Deserialize, Serialize};

/// Lifecycle state of the managed container as reported by the runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Absent,
    Stopped,
    Running,
    Unknown,
}

impl ContainerStatus {
    pub fn from_running_flag(running: Option<bool>) -> Self {
        match running {
            Some(true) => Self::Running,
            Some(false) => Self::Stopped,
            None => Self::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == Self::Running
    }
}

/// What an inspect returns. Never cached.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSnapshot {
    pub status: ContainerStatus,
    pub id: Option<String>,
    pub image: Option<String>,
}

impl ContainerSnapshot {
    pub fn absent() -> Self {
        Self {
            status: ContainerStatus::Absent,
            id: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

impl PortMapping {
    pub fn tcp(container_port: u16, host_port: u16) -> Self {
        Self {
            container_port,
            host_port,
            protocol: "tcp".to_string(),
        }
    }

    /// Docker's `<port>/<proto>` key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// Everything the runtime needs to create the managed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub volume: String,
    pub data_dir: String,
    /// `KEY=value` strings.
    pub env: Vec<String>,
    pub network: String,
    pub memory_limit_bytes: Option<i64>,
}

impl ContainerSpec {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.volume, self.data_dir)
    }

    #[cfg(test)]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        let prefix = format!("{}=", key);
        self.env
            .iter()
            .find_map(|entry| entry.strip_prefix(prefix.as_str()))
    }
}

/// Fixed provisioning template; `recreate` fills in version and variant.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub name: String,
    pub image: String,
    pub network: String,
    pub volume: String,
    pub data_dir: String,
    pub game_port: u16,
    pub host_game_port: u16,
    pub console_port: u16,
    pub host_console_port: u16,
    pub console_password: String,
    pub server_type: String,
    pub variant_env: String,
    pub memory: String,
    pub memory_limit_bytes: Option<i64>,
}

impl ProvisionSettings {
    pub fn build_spec(&self, version: &str, variant: &str) -> ContainerSpec {
        let env = vec![
            "EULA=TRUE".to_string(),
            format!("TYPE={}", self.server_type),
            format!("VERSION={}", version),
            format!("{}={}", self.variant_env, variant),
            format!("RCON_PORT={}", self.console_port),
            format!("RCON_PASSWORD={}", self.console_password),
            format!("MEMORY={}", self.memory),
        ];

        ContainerSpec {
            name: self.name.clone(),
            image: self.image.clone(),
            ports: vec![
                PortMapping::tcp(self.game_port, self.host_game_port),
                PortMapping::tcp(self.console_port, self.host_console_port),
            ],
            volume: self.volume.clone(),
            data_dir: self.data_dir.clone(),
            env,
            network: self.network.clone(),
            memory_limit_bytes: self.memory_limit_bytes,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_settings(name: &str) -> ProvisionSettings {
    ProvisionSettings {
        name: name.to_string(),
        image: "itzg/minecraft-server:stable-java21-jdk".to_string(),
        network: "minecraft-net".to_string(),
        volume: "minecraft-data".to_string(),
        data_dir: "/data".to_string(),
        game_port: 25565,
        host_game_port: 25565,
        console_port: 25575,
        host_console_port: 25575,
        console_password: "secret".to_string(),
        server_type: "FORGE".to_string(),
        variant_env: "FORGE_VERSION".to_string(),
        memory: "4G".to_string(),
        memory_limit_bytes: Some(6 * 1024 * 1024 * 1024),
    }
}
