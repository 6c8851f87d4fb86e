//! services/api/src/web/state.rs
//!
//! Defines the application's shared and connection-specific states.

use crate::config::Config;
use chrono::Utc;
use study_assistant_core::ports::{
    DatabaseService, LanguageModelService, SearchService, TextToSpeechService,
};
use study_assistant_core::SessionState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub llm: Arc<dyn LanguageModelService>,
    /// `None` when no search API key is configured.
    pub search: Option<Arc<dyn SearchService>>,
    /// `None` when no speech API key is configured.
    pub tts: Option<Arc<dyn TextToSpeechService>>,
}

//=========================================================================================
// ConnectionState (Specific to One WebSocket Connection)
//=========================================================================================

/// A file arriving over binary frames between `upload_started` and `upload_ended`.
#[derive(Debug)]
pub struct PendingUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The state for a single, active WebSocket connection.
pub struct ConnectionState {
    pub email: String,
    pub session: SessionState,
    pub upload: Option<PendingUpload>,
    /// Cancelled when the socket closes, abandoning background work.
    pub cancellation_token: CancellationToken,
}

impl ConnectionState {
    pub fn new(email: String) -> Self {
        Self {
            email,
            session: SessionState::new(Utc::now()),
            upload: None,
            cancellation_token: CancellationToken::new(),
        }
    }
}
