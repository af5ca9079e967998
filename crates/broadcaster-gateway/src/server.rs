use crate::connection::{ConnectionManager, Viewer};
use crate::middleware::{auth_middleware, AuthConfig};
use crate::page::INDEX_HTML;
use crate::runner::{RunLauncher, StartError};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    middleware as axum_mw,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use broadcaster_core::BroadcastError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    /// Starts runs and holds the latest snapshot.
    pub launcher: Arc<RunLauncher>,
    /// Open WebSocket viewers.
    pub connections: Arc<ConnectionManager>,
}

/// Body of `POST /api/broadcast`.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Text sent on both channels.
    pub message: String,
}

/// The main gateway server.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth.
    pub fn build(launcher: Arc<RunLauncher>, connections: Arc<ConnectionManager>) -> Router {
        Self::build_with_auth(launcher, connections, AuthConfig::default())
    }

    /// Build the gateway, requiring one of `auth.api_keys` when any are set.
    ///
    /// `connections` must be the manager the launcher publishes to.
    pub fn build_with_auth(
        launcher: Arc<RunLauncher>,
        connections: Arc<ConnectionManager>,
        auth: AuthConfig,
    ) -> Router {
        let state = Arc::new(AppState {
            launcher,
            connections,
        });

        let app = Router::new()
            .route("/", get(index_handler))
            .route("/health", get(health_handler))
            .route("/api/status", get(status_handler))
            .route("/api/broadcast", post(start_handler))
            .route("/ws", get(ws_handler))
            .with_state(state);

        if auth.is_enabled() {
            app.layer(axum_mw::from_fn_with_state(Arc::new(auth), auth_middleware))
        } else {
            app
        }
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "service": "broadcaster"}))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut snapshot = serde_json::to_value(state.launcher.snapshot().await).unwrap_or_default();
    snapshot["running"] = serde_json::Value::Bool(state.launcher.is_running());
    Json(snapshot)
}

async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Response {
    match state.launcher.start(request.message).await {
        Ok(run_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "run_id": run_id })),
        )
            .into_response(),
        Err(e) => {
            let status = match &e {
                StartError::Busy => StatusCode::CONFLICT,
                StartError::Rejected(BroadcastError::Validation(_)) => StatusCode::BAD_REQUEST,
                StartError::Rejected(BroadcastError::Dataset(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                StartError::Rejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(status = %status, error = %e, "Broadcast not started");
            (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    use futures_util::{SinkExt, StreamExt};

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (viewer, mut rx) = Viewer::channel();
    let viewer_id = state.connections.add(viewer).await;
    info!(viewer_id = %viewer_id, "WebSocket connected");

    // Late joiners get the current picture first.
    let welcome = serde_json::json!({
        "type": "snapshot",
        "viewer_id": viewer_id,
        "snapshot": state.launcher.snapshot().await,
    });
    state.connections.send_to(viewer_id, &welcome.to_string()).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Viewers are read-only; only watch for the close.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.connections.remove(viewer_id).await;
    info!(viewer_id = %viewer_id, "WebSocket disconnected");
}
