use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ActionResponse, action_error, status_for};
use crate::container::{ContainerStatus, LifecycleManager};
use crate::error::ControlError;
use crate::players::{self, PlayerRecord};
use crate::rcon::Console;

#[derive(Clone)]
pub struct ServerAppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub console: Arc<dyn Console>,
}

// === Request DTOs ===

#[derive(Deserialize)]
struct RecreateRequest {
    version: Option<String>,
    #[serde(alias = "forgeVersion")]
    variant: Option<String>,
}

#[derive(Deserialize)]
struct PlayerRequest {
    player: Option<String>,
}

#[derive(Deserialize)]
struct CommandRequest {
    command: Option<String>,
}

// === Response DTOs ===

#[derive(Serialize)]
struct StatusResponse {
    /// "on" / "off", as the panel expects
    status: &'static str,
    state: ContainerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct PlayersErrorResponse {
    players: Vec<PlayerRecord>,
    error: String,
}

pub fn server_router(lifecycle: Arc<LifecycleManager>, console: Arc<dyn Console>) -> Router {
    let state = ServerAppState { lifecycle, console };

    Router::new()
        // Lifecycle
        .route("/api/server/status", get(get_status))
        .route("/api/server/start", post(start_server))
        .route("/api/server/stop", post(stop_server))
        .route("/api/server/recreate", post(recreate_server))
        // Console
        .route("/api/server/players", get(get_players))
        .route("/api/server/kick", post(kick_player))
        .route("/api/server/ban", post(ban_player))
        .route("/api/server/command", post(send_command))
        .with_state(state)
}

async fn get_status(State(state): State<ServerAppState>) -> Response {
    match state.lifecycle.inspect().await {
        Ok(snapshot) if snapshot.status == ContainerStatus::Absent => (
            StatusCode::NOT_FOUND,
            Json(StatusResponse {
                status: "off",
                state: snapshot.status,
                image: None,
                error: Some("Container not found".to_string()),
            }),
        ).into_response(),
        Ok(snapshot) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: if snapshot.status.is_running() { "on" } else { "off" },
                state: snapshot.status,
                image: snapshot.image,
                error: None,
            }),
        ).into_response(),
        Err(e) => {
            tracing::error!("Failed to inspect {}: {}", state.lifecycle.container_name(), e);
            (
                status_for(&e),
                Json(StatusResponse {
                    status: "off",
                    state: ContainerStatus::Unknown,
                    image: None,
                    error: Some(e.to_string()),
                }),
            ).into_response()
        }
    }
}

#[axum::debug_handler]
async fn start_server(State(state): State<ServerAppState>) -> Response {
    match state.lifecycle.start().await {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::ok("Server starting..."))).into_response(),
        Err(e) => action_error(e, "Error starting the server."),
    }
}

#[axum::debug_handler]
async fn stop_server(State(state): State<ServerAppState>) -> Response {
    match state.lifecycle.stop().await {
        Ok(()) => (StatusCode::OK, Json(ActionResponse::ok("Server stopping..."))).into_response(),
        Err(e) => action_error(e, "Error stopping the server."),
    }
}

#[axum::debug_handler]
async fn recreate_server(
    State(state): State<ServerAppState>,
    Json(payload): Json<RecreateRequest>,
) -> Response {
    let version = payload.version.unwrap_or_default();
    let variant = payload.variant.unwrap_or_default();

    match state.lifecycle.recreate(&version, &variant).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ActionResponse::ok(
                "Server recreated with the new versions. It may take several minutes to start.",
            )),
        ).into_response(),
        Err(e @ ControlError::InvalidRequest(_)) => {
            action_error(e, "Both the game version and the variant version are required.")
        }
        Err(e) => action_error(e, "Error recreating the server."),
    }
}

async fn get_players(State(state): State<ServerAppState>) -> Response {
    match players::fetch_roster(state.console.as_ref()).await {
        Ok(roster) => (StatusCode::OK, Json(roster)).into_response(),
        Err(e) => {
            tracing::error!("Console error while listing players: {}", e);
            (
                status_for(&e),
                Json(PlayersErrorResponse {
                    players: Vec::new(),
                    error: "Could not connect to the console. Is the server on and the password correct?"
                        .to_string(),
                }),
            ).into_response()
        }
    }
}

async fn kick_player(
    State(state): State<ServerAppState>,
    Json(payload): Json<PlayerRequest>,
) -> Response {
    player_command(&state, payload, "kick", "kicked").await
}

async fn ban_player(
    State(state): State<ServerAppState>,
    Json(payload): Json<PlayerRequest>,
) -> Response {
    player_command(&state, payload, "ban", "banned").await
}

async fn player_command(
    state: &ServerAppState,
    payload: PlayerRequest,
    verb: &str,
    past: &str,
) -> Response {
    let player = match payload.player.as_deref().map(str::trim) {
        Some(player) if !player.is_empty() => player.to_string(),
        _ => {
            return action_error(
                ControlError::InvalidRequest("player is required".to_string()),
                "Player name not specified.",
            );
        }
    };

    match state.console.execute(&format!("{} {}", verb, player)).await {
        Ok(reply) => {
            tracing::info!("Player {} {}", player, past);
            let mut response = ActionResponse::ok(format!("Player {} {}.", player, past));
            response.reply = Some(reply);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => action_error(e, &format!("Error trying to {} the player.", verb)),
    }
}

async fn send_command(
    State(state): State<ServerAppState>,
    Json(payload): Json<CommandRequest>,
) -> Response {
    let command = payload.command.unwrap_or_default();
    if command.trim().is_empty() {
        return action_error(
            ControlError::InvalidRequest("command is empty".to_string()),
            "Empty command.",
        );
    }

    match state.console.execute(&command).await {
        Ok(reply) => {
            let mut response = ActionResponse::ok("Command sent.");
            response.reply = Some(reply);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => action_error(e, "Could not send the command to the console."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::fake::FakeRuntime;
    use crate::container::spec::test_settings;
    use crate::error::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Records every command; answers with `reply` or fails like a refused login.
    struct RecordingConsole {
        reply: Option<String>,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingConsole {
        fn replying(reply: &str) -> Self {
            Self { reply: Some(reply.to_string()), sent: Mutex::new(Vec::new()) }
        }

        fn rejecting() -> Self {
            Self { reply: None, sent: Mutex::new(Vec::new()) }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Console for RecordingConsole {
        async fn execute(&self, command: &str) -> Result<String> {
            self.sent.lock().unwrap().push(command.to_string());
            self.reply.clone().ok_or(ControlError::ProtocolAuthFailure)
        }
    }

    fn app_state(runtime: FakeRuntime, console: Arc<RecordingConsole>) -> ServerAppState {
        let (lifecycle, _rx) = LifecycleManager::new(Arc::new(runtime), test_settings("mc"));
        ServerAppState {
            lifecycle: Arc::new(lifecycle),
            console,
        }
    }

    async fn body_of(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn player(name: &str) -> Json<PlayerRequest> {
        Json(PlayerRequest { player: Some(name.to_string()) })
    }

    #[tokio::test]
    async fn test_status_of_absent_container_is_off() {
        let state = app_state(FakeRuntime::new(), Arc::new(RecordingConsole::rejecting()));
        let (status, body) = body_of(get_status(State(state)).await).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "off");
        assert_eq!(body["state"], "absent");
    }

    #[tokio::test]
    async fn test_status_of_running_container_is_on() {
        let state = app_state(
            FakeRuntime::with_container("mc", true),
            Arc::new(RecordingConsole::rejecting()),
        );
        let (status, body) = body_of(get_status(State(state)).await).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "on");
        assert_eq!(body["state"], "running");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_second_start_is_conflict() {
        let state = app_state(
            FakeRuntime::with_container("mc", true),
            Arc::new(RecordingConsole::rejecting()),
        );
        let (status, body) = body_of(start_server(State(state)).await).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_recreate_accepts_forge_version_alias() {
        let state = app_state(FakeRuntime::new(), Arc::new(RecordingConsole::rejecting()));
        let request: RecreateRequest =
            serde_json::from_value(json!({ "version": "1.20.1", "forgeVersion": "47.2.0" }))
                .unwrap();

        let (status, body) = body_of(recreate_server(State(state.clone()), Json(request)).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = body_of(get_status(State(state)).await).await;
        assert_eq!(body["state"], "running");
    }

    #[tokio::test]
    async fn test_recreate_without_variant_is_bad_request() {
        let state = app_state(FakeRuntime::new(), Arc::new(RecordingConsole::rejecting()));
        let request: RecreateRequest =
            serde_json::from_value(json!({ "version": "1.20.1" })).unwrap();

        let (status, body) = body_of(recreate_server(State(state), Json(request)).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_console_failure_lists_no_players() {
        let state = app_state(FakeRuntime::new(), Arc::new(RecordingConsole::rejecting()));
        let (status, body) = body_of(get_players(State(state)).await).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["players"], json!([]));
        assert!(body["error"].as_str().unwrap().starts_with("Could not connect"));
    }

    #[tokio::test]
    async fn test_players_lists_roster() {
        let console = Arc::new(RecordingConsole::replying(
            "There are 1 of a max of 20 players online: alice",
        ));
        let state = app_state(FakeRuntime::new(), console.clone());
        let (status, body) = body_of(get_players(State(state)).await).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["players"][0]["name"], "alice");
        assert_eq!(body["players"][0]["isOp"], false);
        assert_eq!(console.sent(), vec!["op list", "list"]);
    }

    #[tokio::test]
    async fn test_kick_and_ban_trim_the_player_name() {
        let console = Arc::new(RecordingConsole::replying("done"));
        let state = app_state(FakeRuntime::new(), console.clone());

        let (status, body) = body_of(kick_player(State(state.clone()), player(" bob ")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Player bob kicked.");
        assert_eq!(body["reply"], "done");

        let (status, _) = body_of(ban_player(State(state), player("eve")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(console.sent(), vec!["kick bob", "ban eve"]);
    }

    #[tokio::test]
    async fn test_blank_player_is_rejected_before_the_console() {
        let console = Arc::new(RecordingConsole::replying("done"));
        let state = app_state(FakeRuntime::new(), console.clone());

        let (status, body) = body_of(kick_player(State(state), player("   ")).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(console.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected_before_the_console() {
        let console = Arc::new(RecordingConsole::replying("done"));
        let state = app_state(FakeRuntime::new(), console.clone());

        let request = Json(CommandRequest { command: Some(String::new()) });
        let (status, _) = body_of(send_command(State(state.clone()), request).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(console.sent().is_empty());

        let request = Json(CommandRequest { command: Some("say hi".to_string()) });
        let (status, body) = body_of(send_command(State(state), request).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "done");
        assert_eq!(console.sent(), vec!["say hi"]);
    }
}
