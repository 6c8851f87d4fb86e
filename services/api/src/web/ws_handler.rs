//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It owns the connection's session state and delegates each request to a task.

use crate::{
    adapters::extract::extract_document,
    web::{
        chat_task::{chat_process, ChatOutcome},
        middleware::CurrentUser,
        profile_task::spawn_profile_update,
        protocol::{ClientMessage, ServerMessage},
        state::{AppState, ConnectionState, PendingUpload},
        voice_task::voice_overview_process,
    },
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use bytes::Bytes;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use study_assistant_core::{
    context::system_prompt,
    ports::{PortError, PortResult},
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Largest upload accepted over the socket.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// The write half of a socket, shared between the receive loop and background tasks.
pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Serializes and sends one protocol message.
pub async fn send_message(ws_sender: &WsSender, msg: &ServerMessage) -> PortResult<()> {
    let json = serde_json::to_string(msg).map_err(|e| PortError::Unexpected(e.to_string()))?;
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to send message to client: {}", e)))
}

pub async fn send_binary(ws_sender: &WsSender, data: Bytes) -> PortResult<()> {
    ws_sender
        .lock()
        .await
        .send(Message::Binary(data))
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to send audio to client: {}", e)))
}

/// Reports a failed request to the client. Provider hiccups and missing
/// optional services are warnings; anything else is an error.
async fn report_failure(ws_sender: &WsSender, err: &PortError) {
    let message = err.user_message();
    let msg = match err {
        PortError::Llm(_) | PortError::Unavailable(_) => ServerMessage::Warning { message },
        _ => ServerMessage::Error { message },
    };
    if let Err(e) = send_message(ws_sender, &msg).await {
        warn!("Failed to report failure to client: {}", e);
    }
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user.email))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, email: String) {
    info!("New WebSocket connection established for user: {}", email);

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let conn = Arc::new(Mutex::new(ConnectionState::new(email.clone())));
    let profile = match app_state.db.find_user(&email).await {
        Ok(profile) => profile,
        Err(e) => {
            error!("Failed to load profile for {}: {:?}", email, e);
            None
        }
    };
    let nickname = profile
        .as_ref()
        .map(|p| p.nickname.clone())
        .unwrap_or_else(|| "Learner".to_string());
    conn.lock()
        .await
        .session
        .inject_system_prompt(system_prompt(profile.as_ref()));

    if send_message(&ws_sender, &ServerMessage::SessionInitialized { nickname })
        .await
        .is_err()
    {
        error!("Failed to send session initialized message.");
        return;
    }

    // --- 2. Main Message Loop ---
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text_message(text.as_str(), &app_state, &conn, &ws_sender).await;
            }
            Ok(Message::Binary(data)) => {
                handle_upload_chunk(&data, &conn, &ws_sender).await;
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    conn.lock().await.cancellation_token.cancel();
    info!("WebSocket connection closed for user: {}", email);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    conn: &Arc<Mutex<ConnectionState>>,
    ws_sender: &WsSender,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    match client_msg {
        ClientMessage::Chat { text, mode } => {
            match chat_process(app_state.clone(), conn.clone(), ws_sender.clone(), text, mode).await
            {
                Ok(ChatOutcome::Replied) => {
                    spawn_profile_update(app_state.clone(), conn.clone(), ws_sender.clone());
                }
                Ok(ChatOutcome::NothingToSend) => {
                    info!("Chat message had no text and no prefill; ignoring.");
                }
                Err(e) => {
                    error!("Error in chat process: {:?}", e);
                    report_failure(ws_sender, &e).await;
                }
            }
        }
        ClientMessage::QuickAction { action } => {
            let text = conn
                .lock()
                .await
                .session
                .apply_quick_action(action)
                .to_string();
            if let Err(e) = send_message(ws_sender, &ServerMessage::PrefillSet { text }).await {
                warn!("Failed to send prefill: {}", e);
            }
        }
        ClientMessage::UploadStarted { file_name } => {
            info!("Upload of '{}' started.", file_name);
            conn.lock().await.upload = Some(PendingUpload {
                file_name,
                bytes: Vec::new(),
            });
        }
        ClientMessage::UploadEnded => {
            finish_upload(conn, ws_sender).await;
        }
        ClientMessage::VoiceOverview { language } => {
            if let Err(e) =
                voice_overview_process(app_state.clone(), conn.clone(), ws_sender.clone(), language)
                    .await
            {
                error!("Error generating voice overview: {:?}", e);
                report_failure(ws_sender, &e).await;
            }
        }
    }
}

async fn handle_upload_chunk(data: &[u8], conn: &Arc<Mutex<ConnectionState>>, ws_sender: &WsSender) {
    let mut conn = conn.lock().await;
    let Some(upload) = conn.upload.as_mut() else {
        warn!("Binary frame received outside of an upload; ignoring.");
        return;
    };
    if upload.bytes.len() + data.len() > MAX_UPLOAD_BYTES {
        let file_name = upload.file_name.clone();
        conn.upload = None;
        drop(conn);
        warn!("Upload of '{}' exceeded {} bytes; discarded.", file_name, MAX_UPLOAD_BYTES);
        let msg = ServerMessage::Error {
            message: format!("'{}' is too large to upload.", file_name),
        };
        if let Err(e) = send_message(ws_sender, &msg).await {
            warn!("Failed to send upload error: {}", e);
        }
        return;
    }
    upload.bytes.extend_from_slice(data);
}

/// Extracts the finished upload and makes it the session's document.
async fn finish_upload(conn: &Arc<Mutex<ConnectionState>>, ws_sender: &WsSender) {
    let Some(PendingUpload { file_name, bytes }) = conn.lock().await.upload.take() else {
        warn!("upload_ended received without an upload in progress.");
        return;
    };

    let name = file_name.clone();
    let extracted = tokio::task::spawn_blocking(move || extract_document(&name, &bytes)).await;

    let msg = match extracted {
        Ok(Ok(content)) => {
            info!("Extracted {} chars from '{}'.", content.len(), file_name);
            conn.lock().await.session.set_document(content);
            ServerMessage::DocumentLoaded { file_name }
        }
        Ok(Err(e)) => {
            warn!("Failed to extract '{}': {}", file_name, e);
            ServerMessage::Error {
                message: format!("Error reading file: {}", e),
            }
        }
        Err(e) => {
            error!("Extraction task for '{}' failed: {}", file_name, e);
            ServerMessage::Error {
                message: format!("Error reading file: {}", file_name),
            }
        }
    };
    if let Err(e) = send_message(ws_sender, &msg).await {
        warn!("Failed to send upload result: {}", e);
    }
}
