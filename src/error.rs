//! Error taxonomy shared by the lifecycle manager, the console client and the
//! HTTP layer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Debug, Error)]
pub enum ControlError {
    /// The managed container does not exist.
    #[error("container not found: {0}")]
    NotFound(String),

    /// Start on a running container, stop on a stopped one.
    #[error("container already {0}")]
    AlreadyInState(String),

    /// Another lifecycle operation holds the container lock.
    #[error("another lifecycle operation is in progress for {0}")]
    Busy(String),

    #[error("console unavailable: {0}")]
    ProtocolUnavailable(String),

    #[error("console rejected the password")]
    ProtocolAuthFailure,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Opaque failure from the container runtime (pull, create, start...).
    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ControlError {
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ProtocolUnavailable(msg.into())
    }

    /// True for the "already gone" outcomes a best-effort step may swallow.
    pub fn is_absence(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AlreadyInState(_))
    }
}

impl From<std::io::Error> for ControlError {
    fn from(e: std::io::Error) -> Self {
        Self::ProtocolUnavailable(e.to_string())
    }
}

impl From<bollard::errors::Error> for ControlError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error as DockerError;

        match e {
            DockerError::DockerResponseServerError { status_code: 404, message } => {
                Self::NotFound(message)
            }
            DockerError::DockerResponseServerError { status_code: 304, message } => {
                Self::AlreadyInState(if message.is_empty() {
                    "in requested state".to_string()
                } else {
                    message
                })
            }
            other => Self::Runtime(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_404_maps_to_not_found() {
        let err: ControlError = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container: mc".to_string(),
        }
        .into();
        assert!(matches!(err, ControlError::NotFound(_)));
        assert!(err.is_absence());
    }

    #[test]
    fn test_docker_304_maps_to_already_in_state() {
        let err: ControlError = bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            message: String::new(),
        }
        .into();
        assert!(matches!(err, ControlError::AlreadyInState(_)));
    }

    #[test]
    fn test_docker_500_is_opaque_runtime_error() {
        let err: ControlError = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "pull access denied".to_string(),
        }
        .into();
        assert!(matches!(err, ControlError::Runtime(_)));
        assert!(!err.is_absence());
    }
}
