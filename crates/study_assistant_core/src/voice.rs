//! crates/study_assistant_core/src/voice.rs
//!
//! Builds the script request behind the sidebar voice overview.

use crate::domain::{Language, Message};
use crate::profile::transcript;
use crate::session::SessionState;

const OVERVIEW_PROMPT: &str = r#"Write a short spoken overview, about one minute when read aloud, of the study material below. Write it in {language}. Use plain sentences only: no headings, lists, markdown or emojis, since it will be converted to speech.

Study material:
{material}"#;

/// The material an overview is based on: the uploaded document if there is
/// one, otherwise the conversation so far.
pub fn overview_source(session: &SessionState) -> Option<String> {
    if let Some(document) = &session.document_content {
        return Some(document.clone());
    }
    let turns: Vec<Message> = session.conversation_turns().cloned().collect();
    let text = transcript(&turns);
    (!text.trim().is_empty()).then_some(text)
}

pub fn overview_messages(language: Language, material: &str) -> Vec<Message> {
    vec![Message::user(
        OVERVIEW_PROMPT
            .replace("{language}", language.name())
            .replace("{material}", material),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_document_preferred_over_conversation() {
        let mut session = SessionState::new(Utc::now());
        session.push_user("what is a limit?");
        assert_eq!(
            overview_source(&session).as_deref(),
            Some("User: what is a limit?\n")
        );
        session.set_document("Chapter 1: Limits".to_string());
        assert_eq!(overview_source(&session).as_deref(), Some("Chapter 1: Limits"));
    }

    #[test]
    fn test_empty_session_has_nothing_to_narrate() {
        let mut session = SessionState::new(Utc::now());
        session.inject_system_prompt("prompt");
        assert_eq!(overview_source(&session), None);
    }

    #[test]
    fn test_overview_requested_in_selected_language() {
        let messages = overview_messages(Language::Hindi, "Chapter 1: Limits");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("Write it in Hindi."));
        assert!(messages[0].content.ends_with("Chapter 1: Limits"));
    }
}
