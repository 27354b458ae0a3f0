use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use polycrop_shared::{encode_server_message, Ack, ApplyRequest, CancelRequest, CropConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::logic::{apply_selection, await_outcome, cancel_session, open_session};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OpenRequest {
    pub image_data: String,
    #[serde(default)]
    pub config: CropConfig,
}

#[derive(Serialize)]
pub struct OpenResponse {
    pub session_id: String,
}

pub async fn open_handler(
    State(state): State<AppState>,
    Json(request): Json<OpenRequest>,
) -> Json<OpenResponse> {
    let session_id = open_session(&state, request.image_data, request.config).await;
    Json(OpenResponse { session_id })
}

pub async fn result_handler(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match await_outcome(&state, &session_id).await {
        Some(outcome) => Json(outcome).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn apply_handler(
    State(state): State<AppState>,
    Json(request): Json<ApplyRequest>,
) -> Json<Ack> {
    Json(apply_selection(&state, request).await)
}

pub async fn cancel_handler(
    State(state): State<AppState>,
    Json(request): Json<CancelRequest>,
) -> Json<Ack> {
    Json(cancel_session(&state, request).await)
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let mut events = state.events.subscribe();
    let connection_id = Uuid::new_v4();
    info!(
        "WS connected conn={connection_id} pages={}",
        state.events.receiver_count()
    );

    let send_task = tokio::spawn(async move {
        loop {
            let message = match events.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WS conn={connection_id} lagged, {skipped} events skipped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let payload = encode_server_message(&message);
            if socket_sender.send(Message::Binary(payload)).await.is_err() {
                break;
            }
        }
    });

    let mut close_frame = None;
    while let Some(Ok(message)) = socket_receiver.next().await {
        if let Message::Close(frame) = message {
            close_frame = frame;
            break;
        }
    }
    send_task.abort();

    info!("WS disconnected conn={connection_id}");
    if let Some(frame) = &close_frame {
        info!(
            "WS close frame conn={connection_id} code={:?} reason={:?}",
            frame.code, frame.reason
        );
    }
}
