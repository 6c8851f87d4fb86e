//! services/api/src/web/profile_task.rs
//!
//! A "fire-and-forget" background task that refreshes the student's learning
//! profile after a chat turn without blocking the conversation.

use crate::web::{
    protocol::ServerMessage,
    state::{AppState, ConnectionState},
    ws_handler::{send_message, WsSender},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use study_assistant_core::{
    domain::ProfileFields,
    ports::{PortError, PortResult},
    profile::update_learning_profile,
    session::SessionState,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Spawns a profile update if the session's cooldown and in-flight rules allow it.
pub fn spawn_profile_update(
    app_state: Arc<AppState>,
    conn: Arc<Mutex<ConnectionState>>,
    ws_sender: WsSender,
) {
    tokio::spawn(async move {
        let (email, token, turns) = {
            let mut conn = conn.lock().await;
            match conn
                .session
                .begin_profile_update(Utc::now(), app_state.config.profile_update_cooldown)
            {
                Ok(turns) => (conn.email.clone(), conn.cancellation_token.clone(), turns),
                Err(reason) => {
                    debug!("Skipping profile update: {:?}", reason);
                    return;
                }
            }
        };

        info!("Spawning background profile update for {}.", email);
        let result = tokio::select! {
            _ = token.cancelled() => {
                info!("Connection closed; abandoning profile update for {}.", email);
                return;
            }
            result = update_learning_profile(
                app_state.db.as_ref(),
                app_state.llm.as_ref(),
                &email,
                &turns,
            ) => result,
        };

        let notice = settle_profile_update(
            &mut conn.lock().await.session,
            &email,
            result,
            Utc::now(),
        );
        if let Some(notice) = notice {
            if let Err(e) = send_message(&ws_sender, &notice).await {
                warn!("Failed to send profile update notification: {}", e);
            }
        }
    });
}

/// Releases the session's in-flight claim and returns the frame, if any, the
/// student should see. Only a successful update restarts the cooldown.
fn settle_profile_update(
    session: &mut SessionState,
    email: &str,
    result: PortResult<ProfileFields>,
    now: DateTime<Utc>,
) -> Option<ServerMessage> {
    match result {
        Ok(fields) => {
            session.finish_profile_update(Some(now));
            info!("Learning profile updated for {}.", email);
            Some(ServerMessage::ProfileUpdated { profile: fields })
        }
        Err(PortError::Extraction(reason)) => {
            session.finish_profile_update(None);
            warn!("Profile update for {} produced nothing usable: {}", email, reason);
            None
        }
        Err(e) => {
            session.finish_profile_update(None);
            error!("Profile update for {} failed: {:?}", email, e);
            Some(ServerMessage::Warning {
                message: format!("Error during learning profile update: {}", e.user_message()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use study_assistant_core::ports::LlmError;

    const EMAIL: &str = "ana@example.com";

    /// A session with one exchange, already claimed for a profile update.
    fn claimed_session(started: DateTime<Utc>) -> SessionState {
        let mut session = SessionState::new(started);
        session.push_user("Explain derivatives");
        session.push_assistant("A derivative measures change.");
        session
            .begin_profile_update(started + Duration::minutes(10), Duration::minutes(5))
            .unwrap();
        session
    }

    #[test]
    fn test_success_restarts_cooldown_and_notifies() {
        let started = Utc::now();
        let finished = started + Duration::minutes(11);
        let mut session = claimed_session(started);
        let fields = ProfileFields {
            recent_topic: Some("Derivatives".to_string()),
            ..ProfileFields::default()
        };

        let notice = settle_profile_update(&mut session, EMAIL, Ok(fields.clone()), finished);

        assert_eq!(notice, Some(ServerMessage::ProfileUpdated { profile: fields }));
        assert_eq!(session.last_profile_update_time(), finished);
        assert!(session.begin_profile_update(finished, Duration::minutes(5)).is_err());
    }

    #[test]
    fn test_extraction_failure_is_silent_and_retryable() {
        let started = Utc::now();
        let mut session = claimed_session(started);

        let notice = settle_profile_update(
            &mut session,
            EMAIL,
            Err(PortError::Extraction("reply contained no profile fields".to_string())),
            started + Duration::minutes(11),
        );

        assert_eq!(notice, None);
        assert_eq!(session.last_profile_update_time(), started);
        assert!(session
            .begin_profile_update(started + Duration::minutes(12), Duration::minutes(5))
            .is_ok());
    }

    #[test]
    fn test_provider_failure_sends_warning() {
        let started = Utc::now();
        let mut session = claimed_session(started);

        let notice = settle_profile_update(
            &mut session,
            EMAIL,
            Err(LlmError::RateLimited("429".to_string()).into()),
            started + Duration::minutes(11),
        );

        match notice {
            Some(ServerMessage::Warning { message }) => {
                assert!(message.starts_with("Error during learning profile update:"))
            }
            other => panic!("expected a warning, got {:?}", other),
        }
        assert_eq!(session.last_profile_update_time(), started);
    }
}
