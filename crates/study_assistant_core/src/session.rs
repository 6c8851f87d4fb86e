//! crates/study_assistant_core/src/session.rs
//!
//! The per-session conversation state. One `SessionState` lives for as long as
//! a single browser tab stays connected; nothing in it is shared between users.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{ChatMode, Message, QuickAction, Role};
use crate::profile::SkipReason;

/// Conversation state for a single connected tab.
#[derive(Debug, Clone)]
pub struct SessionState {
    messages: Vec<Message>,
    init_prompt_injected: bool,
    last_profile_update_time: DateTime<Utc>,
    profile_update_in_flight: bool,
    /// Extracted text of the latest upload, preamble included.
    pub document_content: Option<String>,
    pub selected_mode: ChatMode,
    /// A canned instruction waiting to be submitted in place of typed input.
    pub prefill_input: Option<String>,
}

impl SessionState {
    /// Starts an empty session. The profile cooldown counts from `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            messages: Vec::new(),
            init_prompt_injected: false,
            last_profile_update_time: now,
            profile_update_in_flight: false,
            document_content: None,
            selected_mode: ChatMode::default(),
            prefill_input: None,
        }
    }

    /// Inserts the personalization prompt at the head of the history.
    ///
    /// Returns `false`, and changes nothing, once a prompt has been injected.
    pub fn inject_system_prompt(&mut self, prompt: impl Into<String>) -> bool {
        if self.init_prompt_injected {
            return false;
        }
        self.messages.insert(0, Message::system(prompt));
        self.init_prompt_injected = true;
        true
    }

    /// Replaces any previously uploaded document.
    pub fn set_document(&mut self, content: String) {
        self.document_content = Some(content);
    }

    /// Queues a quick action's instruction and returns it.
    pub fn apply_quick_action(&mut self, action: QuickAction) -> &str {
        self.prefill_input.insert(action.instruction().to_string())
    }

    /// Picks the text to submit this turn: typed input wins over a pending
    /// prefill. Any pending prefill is cleared once something is submitted.
    pub fn resolve_input(&mut self, typed: Option<String>) -> Option<String> {
        let typed = typed
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let prefill = self.prefill_input.take();
        match typed.or(prefill.clone()) {
            Some(input) => Some(input),
            None => {
                self.prefill_input = prefill;
                None
            }
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::System)
    }

    /// User and assistant turns in chronological order.
    pub fn conversation_turns(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_conversation_turn())
    }

    pub fn has_conversation(&self) -> bool {
        self.conversation_turns().next().is_some()
    }

    pub fn last_profile_update_time(&self) -> DateTime<Utc> {
        self.last_profile_update_time
    }

    /// Claims the right to run a profile update at `now`.
    ///
    /// On success the session is marked in flight and a snapshot of the
    /// conversation turns is returned; the caller must follow up with
    /// [`SessionState::finish_profile_update`].
    pub fn begin_profile_update(
        &mut self,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<Vec<Message>, SkipReason> {
        if self.profile_update_in_flight {
            return Err(SkipReason::InFlight);
        }
        if now - self.last_profile_update_time < cooldown {
            return Err(SkipReason::CoolingDown);
        }
        let turns: Vec<Message> = self.conversation_turns().cloned().collect();
        if turns.is_empty() {
            return Err(SkipReason::NoConversation);
        }
        self.profile_update_in_flight = true;
        Ok(turns)
    }

    /// Releases the in-flight claim. `succeeded_at` restarts the cooldown;
    /// `None` leaves it alone so the next turn may retry.
    pub fn finish_profile_update(&mut self, succeeded_at: Option<DateTime<Utc>>) {
        self.profile_update_in_flight = false;
        if let Some(at) = succeeded_at {
            if at > self.last_profile_update_time {
                self.last_profile_update_time = at;
            }
        }
    }
}
