//! services/api/src/web/voice_task.rs
//!
//! Generates the spoken overview of the current study material.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, ConnectionState},
    ws_handler::{send_binary, send_message, WsSender},
};
use std::sync::Arc;
use study_assistant_core::{
    domain::{Language, ModelChoice},
    ports::{PortError, PortResult},
    voice::{overview_messages, overview_source},
};
use tokio::sync::Mutex;
use tracing::info;

/// Writes an overview script in `language`, renders it to speech and sends it.
pub async fn voice_overview_process(
    app_state: Arc<AppState>,
    conn: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender,
    language: Language,
) -> PortResult<()> {
    let tts = app_state
        .tts
        .clone()
        .ok_or_else(|| PortError::Unavailable("Voice overview".to_string()))?;

    let material = overview_source(&conn.lock().await.session);
    let Some(material) = material else {
        return send_message(
            &ws_sender,
            &ServerMessage::Warning {
                message: "Upload a document or start chatting to get a voice overview.".to_string(),
            },
        )
        .await;
    };

    let script = app_state
        .llm
        .complete(ModelChoice::Default, &overview_messages(language, &material))
        .await?;
    info!("Generated {} overview script ({} chars).", language.name(), script.len());

    let audio = tts.generate_audio(script.trim()).await?;

    send_message(&ws_sender, &ServerMessage::VoiceOverviewReady { language }).await?;
    send_binary(&ws_sender, audio).await
}
