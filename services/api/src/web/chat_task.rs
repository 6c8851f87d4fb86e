//! services/api/src/web/chat_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! handling a single chat turn, from resolving the input to committing the reply.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, ConnectionState},
    ws_handler::{send_message, WsSender},
};
use std::sync::Arc;
use std::time::Instant;
use study_assistant_core::{
    context::build_context,
    domain::ChatMode,
    ports::PortResult,
    session::SessionState,
    stream::Reply,
    turn::{plan_turn, stream_reply},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Represents the outcome of the `chat_process` task.
/// This tells the main handler what action to take next.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Neither typed text nor a prefill was available.
    NothingToSend,
    /// A reply was streamed and committed to history.
    Replied,
}

/// The main asynchronous task for handling a single chat turn.
///
/// The user message is recorded as soon as the turn starts. The assistant reply
/// is only recorded once the stream completes; on error nothing partial is kept.
pub async fn chat_process(
    app_state: Arc<AppState>,
    conn: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender,
    text: Option<String>,
    mode: ChatMode,
) -> PortResult<ChatOutcome> {
    let start_time = Instant::now();

    let (utterance, context) = {
        let mut conn = conn.lock().await;
        conn.session.selected_mode = mode;
        let Some(utterance) = conn.session.resolve_input(text) else {
            return Ok(ChatOutcome::NothingToSend);
        };
        let context = build_context(&conn.session, &utterance);
        conn.session.push_user(utterance.as_str());
        (utterance, context)
    };
    info!("Chat turn started in {:?} mode.", mode);

    let plan = plan_turn(
        mode,
        context,
        &utterance,
        app_state.llm.as_ref(),
        app_state.search.as_deref(),
    )
    .await?;

    if let Some(query) = &plan.search_query {
        send_message(
            &ws_sender,
            &ServerMessage::SearchPerformed {
                query: query.clone(),
            },
        )
        .await?;
    }

    let streamed = stream_reply(app_state.llm.as_ref(), &plan, |text| {
        let ws_sender = ws_sender.clone();
        async move {
            if let Err(e) = send_message(&ws_sender, &ServerMessage::Delta { text }).await {
                warn!("Failed to send delta: {}", e);
            }
        }
    })
    .await;
    let reply = commit_reply(&mut conn.lock().await.session, streamed)?;

    send_message(
        &ws_sender,
        &ServerMessage::ResponseCompleted {
            text: reply.text,
            thought: reply.thought,
        },
    )
    .await?;

    info!("⏱️ Chat turn took: {:?}", start_time.elapsed());
    Ok(ChatOutcome::Replied)
}

/// Records a finished reply in history. A failed stream commits nothing and
/// leaves the user message where it is.
fn commit_reply(session: &mut SessionState, streamed: PortResult<Reply>) -> PortResult<Reply> {
    let reply = streamed?;
    session.push_assistant(reply.text.as_str());
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use study_assistant_core::{
        domain::{Message, Role},
        ports::{LlmError, PortError},
    };

    fn session_with_pending_turn() -> SessionState {
        let mut session = SessionState::new(Utc::now());
        session.inject_system_prompt("prompt");
        session.push_user("What is a derivative?");
        session
    }

    #[test]
    fn test_failed_stream_keeps_user_message_only() {
        let mut session = session_with_pending_turn();
        let err = commit_reply(
            &mut session,
            Err(LlmError::Transient("connection reset".to_string()).into()),
        )
        .unwrap_err();

        assert!(matches!(err, PortError::Llm(LlmError::Transient(_))));
        assert_eq!(session.messages().len(), 2);
        assert_eq!(
            session.messages().last(),
            Some(&Message::user("What is a derivative?"))
        );
    }

    #[test]
    fn test_completed_stream_is_committed() {
        let mut session = session_with_pending_turn();
        let reply = commit_reply(
            &mut session,
            Ok(Reply {
                text: "The rate of change.".to_string(),
                thought: None,
            }),
        )
        .unwrap();

        assert_eq!(reply.text, "The rate of change.");
        let last = session.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "The rate of change.");
    }
}
