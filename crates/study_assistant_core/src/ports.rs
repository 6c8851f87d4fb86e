//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    Message, ModelChoice, NewUser, ProfileFields, SearchSnippet, UserCredentials, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A classified failure reported by the language model provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited by the model provider: {0}")]
    RateLimited(String),
    #[error("Request exceeded the model's context window: {0}")]
    ContextTooLong(String),
    #[error("Transient model provider failure: {0}")]
    Transient(String),
    #[error("Model provider error: {0}")]
    Fatal(String),
}

impl LlmError {
    /// The warning shown to the student when a turn fails with this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            LlmError::RateLimited(_) => {
                "The assistant is receiving too many requests right now. Please wait a moment and try again."
            }
            LlmError::ContextTooLong(_) => {
                "Too much text was sent to the assistant. Try a shorter message or a smaller document."
            }
            LlmError::Transient(_) => {
                "The assistant is temporarily unavailable. Please try again."
            }
            LlmError::Fatal(_) => "The assistant could not answer this message.",
        }
    }
}

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// The model answered, but not in a shape the caller could use.
    #[error("Could not parse model output: {0}")]
    Extraction(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// A message suitable for showing to the student.
    pub fn user_message(&self) -> String {
        match self {
            PortError::Llm(e) => e.user_message().to_string(),
            PortError::Unavailable(what) => format!("{} is not available right now.", what),
            other => format!("Something went wrong: {}", other),
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Incremental text fragments of a streaming completion, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---
    async fn find_user(&self, email: &str) -> PortResult<Option<UserProfile>>;

    async fn create_user(&self, user: NewUser) -> PortResult<UserProfile>;

    /// Direct user edits of the registration details.
    async fn update_details(
        &self,
        email: &str,
        nickname: &str,
        date_of_birth: NaiveDate,
    ) -> PortResult<UserProfile>;

    /// Writes every `Some` field of `fields`, leaving the rest untouched.
    async fn upsert_profile(&self, email: &str, fields: &ProfileFields) -> PortResult<()>;

    // --- Auth ---
    async fn get_credentials(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the email that owns a live auth session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait LanguageModelService: Send + Sync {
    /// Sends an ordered message list and waits for the whole completion.
    async fn complete(&self, model: ModelChoice, messages: &[Message]) -> PortResult<String>;

    /// Sends an ordered message list and yields the completion as it is generated.
    async fn complete_streaming(
        &self,
        model: ModelChoice,
        messages: &[Message],
    ) -> PortResult<TextStream>;
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Runs a web search and returns ranked snippets with their sources.
    async fn search(&self, query: &str) -> PortResult<Vec<SearchSnippet>>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates MP3 audio from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_too_long_maps_to_too_much_text_warning() {
        let err = PortError::from(LlmError::ContextTooLong("400 tokens over".to_string()));
        assert!(err.user_message().contains("Too much text"));
    }

    #[test]
    fn test_unavailable_names_the_service() {
        let err = PortError::Unavailable("Web search".to_string());
        assert_eq!(err.user_message(), "Web search is not available right now.");
    }
}
