pub mod public;
pub mod server;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::error::ControlError;

#[derive(Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            reply: None,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: &ControlError) -> Self {
        Self {
            success: false,
            message: message.into(),
            reply: None,
            error: Some(error.to_string()),
        }
    }
}

pub fn status_for(error: &ControlError) -> StatusCode {
    match error {
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::AlreadyInState(_) | ControlError::Busy(_) => StatusCode::CONFLICT,
        ControlError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ControlError::ProtocolUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::ProtocolAuthFailure => StatusCode::BAD_GATEWAY,
        ControlError::Runtime(_) | ControlError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failure reply for a mutating endpoint, with a summary the panel can show.
pub fn action_error(error: ControlError, summary: &str) -> Response {
    let message = match &error {
        ControlError::ProtocolUnavailable(_) | ControlError::ProtocolAuthFailure => format!(
            "{} Could not reach the console. Is the server on and the password correct?",
            summary
        ),
        ControlError::Busy(_) => format!("{} Another server operation is still running.", summary),
        _ => summary.to_string(),
    };
    (status_for(&error), Json(ActionResponse::failed(message, &error))).into_response()
}
