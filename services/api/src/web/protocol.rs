//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the study chat.

use serde::{Deserialize, Serialize};
use study_assistant_core::domain::{ChatMode, Language, ProfileFields, QuickAction};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Uploaded file contents are sent as raw Binary frames, not as part of this enum.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submits a turn. Without `text` the pending quick-action prefill is sent.
    Chat {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        mode: ChatMode,
    },

    /// Queues one of the canned document instructions.
    QuickAction { action: QuickAction },

    /// Announces a file upload. Binary frames that follow carry its bytes.
    UploadStarted { file_name: String },

    /// Signals that every binary frame of the upload has been sent.
    UploadEnded,

    /// Requests a spoken overview of the current material.
    VoiceOverview {
        #[serde(default)]
        language: Language,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================
// NOTE: Voice overview audio is sent as a raw Binary frame right after
// `VoiceOverviewReady`.
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the connection is ready for chat.
    SessionInitialized { nickname: String },

    /// The input box should now show this instruction.
    PrefillSet { text: String },

    /// An upload was extracted and will be included in every following turn.
    DocumentLoaded { file_name: String },

    /// Web-search mode decided to search, with this query.
    SearchPerformed { query: String },

    /// The reply as it should currently be displayed (the whole running buffer).
    Delta { text: String },

    /// The final, trimmed reply that was committed to history.
    ResponseCompleted {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        thought: Option<String>,
    },

    /// The learning profile was refreshed in the background.
    ProfileUpdated { profile: ProfileFields },

    /// A recoverable problem. The connection stays usable.
    Warning { message: String },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },

    /// The next binary frame is the MP3 overview.
    VoiceOverviewReady { language: Language },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_without_text_defaults_to_plain() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "chat"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Chat {
                text: None,
                mode: ChatMode::Plain
            }
        );
    }

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "chat", "text": "hi", "mode": "web_search"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Chat {
                text: Some("hi".to_string()),
                mode: ChatMode::WebSearch
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "quick_action", "action": "make_quiz"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::QuickAction {
                action: QuickAction::MakeQuiz
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "voice_overview", "language": "hindi"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::VoiceOverview {
                language: Language::Hindi
            }
        );
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "init"}"#).is_err());
    }

    #[test]
    fn test_server_messages_are_tagged() {
        let value = serde_json::to_value(ServerMessage::ResponseCompleted {
            text: "Done".to_string(),
            thought: None,
        })
        .unwrap();
        assert_eq!(value, json!({"type": "response_completed", "text": "Done"}));

        let value = serde_json::to_value(ServerMessage::VoiceOverviewReady {
            language: Language::English,
        })
        .unwrap();
        assert_eq!(value, json!({"type": "voice_overview_ready", "language": "english"}));
    }
}
