//! crates/study_assistant_core/src/context.rs
//!
//! Assembles the exact message list sent to the language model each turn,
//! plus the personalization prompt and document preamble that feed into it.

use crate::domain::{DocumentKind, Message, UserProfile};
use crate::session::SessionState;

const FALLBACK_SYSTEM_PROMPT: &str = "You're Asti, an expert study assistant. The user information could not be retrieved. Proceed normally, and assist the user with warmth and clarity.";

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are Asti, an intelligent, helpful, and personalized learning co-pilot.

Your goal is to help students learn by explaining concepts in a clear, engaging, and adaptive way. Adjust your style to the student's preferred learning method.

Student Profile:
Name: {nickname}
Most Recent Topic: {recent_topic}
Topics Learned So Far: {topics_learned}
Preferred Learning Style: {learning_style}

Instructions:
- Always adapt your tone and explanations to the student's style.
- Reinforce current learning by referencing related past topics when appropriate.
- If the user uploads a document, prioritize its content unless told otherwise.
- Be friendly, and educational at all times. You can use emojis for a good understanding."#;

/// Treats blank and placeholder values ("none", "null", ...) as missing.
fn known_value<'a>(value: Option<&'a str>, placeholders: &[&str]) -> Option<&'a str> {
    value.map(str::trim).filter(|v| {
        !v.is_empty() && !placeholders.iter().any(|p| v.eq_ignore_ascii_case(p))
    })
}

/// Renders the personalization prompt from a stored profile.
pub fn system_prompt(profile: Option<&UserProfile>) -> String {
    let Some(profile) = profile else {
        return FALLBACK_SYSTEM_PROMPT.to_string();
    };

    let nickname = known_value(Some(profile.nickname.as_str()), &[]).unwrap_or("Learner");
    let recent_topic =
        known_value(profile.recent_topic.as_deref(), &["none", "null"]).unwrap_or("Not available");
    let topics: Vec<&str> = profile
        .topics_learned
        .iter()
        .filter_map(|t| known_value(Some(t.as_str()), &["none", "null"]))
        .collect();
    let topics_learned = if topics.is_empty() {
        "Not available".to_string()
    } else {
        topics.join(", ")
    };
    let learning_style = known_value(
        profile.learning_style.as_deref(),
        &["none", "null", "not specified"],
    )
    .unwrap_or("Not identified yet");

    SYSTEM_PROMPT_TEMPLATE
        .replace("{nickname}", nickname)
        .replace("{recent_topic}", recent_topic)
        .replace("{topics_learned}", &topics_learned)
        .replace("{learning_style}", learning_style)
}

/// Wraps extracted document text in the preamble stored as `document_content`.
pub fn document_preamble(kind: DocumentKind, text: &str) -> String {
    format!(
        "User uploaded a {} document. Here are the contents of it:\n\n{}",
        kind.label(),
        text
    )
}

/// Builds the outbound message list for a turn:
/// system prompt, then the uploaded document, then prior turns, then the new utterance.
pub fn build_context(session: &SessionState, utterance: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = session.system_messages().cloned().collect();
    if let Some(document) = &session.document_content {
        messages.push(Message::system(document.clone()));
    }
    messages.extend(session.conversation_turns().cloned());
    messages.push(Message::user(utterance));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuickAction, Role};
    use chrono::Utc;

    fn profile() -> UserProfile {
        UserProfile {
            email: "ana@example.com".to_string(),
            nickname: "Ana".to_string(),
            date_of_birth: None,
            recent_topic: Some("Limits".to_string()),
            topics_learned: vec!["Limits".to_string(), "none".to_string()],
            learning_style: Some("visual".to_string()),
        }
    }

    #[test]
    fn test_system_prompt_includes_profile_fields() {
        let prompt = system_prompt(Some(&profile()));
        assert!(prompt.contains("Name: Ana"));
        assert!(prompt.contains("Most Recent Topic: Limits"));
        assert!(prompt.contains("Topics Learned So Far: Limits\n"));
        assert!(prompt.contains("Preferred Learning Style: visual"));
    }

    #[test]
    fn test_system_prompt_placeholders_for_missing_fields() {
        let mut p = profile();
        p.nickname = "  ".to_string();
        p.recent_topic = Some("NULL".to_string());
        p.topics_learned.clear();
        p.learning_style = Some("Not Specified".to_string());
        let prompt = system_prompt(Some(&p));
        assert!(prompt.contains("Name: Learner"));
        assert!(prompt.contains("Most Recent Topic: Not available"));
        assert!(prompt.contains("Topics Learned So Far: Not available"));
        assert!(prompt.contains("Preferred Learning Style: Not identified yet"));
    }

    #[test]
    fn test_missing_profile_uses_fallback_prompt() {
        assert_eq!(system_prompt(None), FALLBACK_SYSTEM_PROMPT);
    }

    #[test]
    fn test_build_context_orders_prompt_document_history_utterance() {
        let mut session = SessionState::new(Utc::now());
        session.inject_system_prompt("prompt");
        session.push_user("q1");
        session.push_assistant("a1");
        session.set_document("doc".to_string());

        let context = build_context(&session, "q2");
        assert_eq!(
            context,
            vec![
                Message::system("prompt"),
                Message::system("doc"),
                Message::user("q1"),
                Message::assistant("a1"),
                Message::user("q2"),
            ]
        );
    }

    #[test]
    fn test_document_included_on_every_turn_until_replaced() {
        let mut session = SessionState::new(Utc::now());
        session.inject_system_prompt("prompt");
        session.set_document("first upload".to_string());

        for turn in 0..3 {
            let context = build_context(&session, &format!("question {turn}"));
            assert_eq!(context[1], Message::system("first upload"));
            session.push_user(format!("question {turn}"));
            session.push_assistant("answer");
        }

        session.set_document("second upload".to_string());
        let context = build_context(&session, "next");
        let documents: Vec<_> = context
            .iter()
            .filter(|m| m.role == Role::System && m.content.contains("upload"))
            .collect();
        assert_eq!(documents, vec![&Message::system("second upload")]);
    }

    #[test]
    fn test_summarize_scenario_after_pdf_upload() {
        let mut session = SessionState::new(Utc::now());
        let prompt = system_prompt(Some(&profile()));
        session.inject_system_prompt(prompt.clone());
        let document = document_preamble(DocumentKind::Pdf, "Chapter 1: Limits");
        session.set_document(document.clone());

        session.apply_quick_action(QuickAction::Summarize);
        let input = session.resolve_input(None).unwrap();
        let context = build_context(&session, &input);

        assert_eq!(
            context,
            vec![
                Message::system(prompt),
                Message::system(
                    "User uploaded a PDF document. Here are the contents of it:\n\nChapter 1: Limits"
                ),
                Message::user(QuickAction::Summarize.instruction()),
            ]
        );
        assert_eq!(context[1].content, document);
    }
}
