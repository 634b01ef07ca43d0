use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::KEEPALIVE_SECS;
use crate::error::Error;
use crate::message::Message;
use crate::resolver::Resolver;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
    /// Process-wide shutdown; every WebSocket subscription hangs off it.
    pub shutdown: CancellationToken,
    pub keepalive: Duration,
}

impl AppState {
    pub fn new(resolver: Resolver, shutdown: CancellationToken) -> Self {
        Self {
            resolver,
            shutdown,
            keepalive: Duration::from_secs(KEEPALIVE_SECS),
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct CreateMessage {
    text: String,
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Format(_) | Error::IngestRunning => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<CreateMessage>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state.resolver.create_message(&body.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.resolver.messages().await?))
}

async fn ws_messages(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws_messages(socket, state))
}

async fn handle_ws_messages(socket: WebSocket, state: AppState) {
    let cancel = state.shutdown.child_token();
    // Closing the socket, for any reason, ends the subscription.
    let _guard = cancel.clone().drop_guard();
    let mut subscription = state.resolver.subscribe(cancel.clone());
    let token = subscription.token().clone();
    tracing::info!(%token, "websocket subscriber connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut keepalive = tokio::time::interval(state.keepalive);
    keepalive.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = subscription.recv() => {
                let Some(message) = next else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(%token, error = %e, "failed to encode message");
                        continue;
                    }
                };
                if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = keepalive.tick() => {
                if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            inbound = ws_rx.next() => match inbound {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        }
    }

    let _ = ws_tx.send(WsMessage::Close(None)).await;
    tracing::info!(%token, "websocket subscriber disconnected");
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages", get(list_messages).post(create_message))
        .route("/ws/messages", get(ws_messages))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
