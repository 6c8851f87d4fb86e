//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The author of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message exchanged with the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// True for user and assistant turns, the only ones a student ever sees.
    pub fn is_conversation_turn(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}

/// A user's stored learning profile, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub nickname: String,
    pub date_of_birth: Option<NaiveDate>,
    pub recent_topic: Option<String>,
    pub topics_learned: Vec<String>,
    pub learning_style: Option<String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub email: String,
    pub password_hash: String,
}

/// Everything needed to register a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub nickname: String,
    pub date_of_birth: NaiveDate,
}

/// The learning-profile fields written by a profile update.
///
/// `None` means "leave the stored value untouched".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileFields {
    pub recent_topic: Option<String>,
    pub learning_style: Option<String>,
    pub topics_learned: Option<Vec<String>>,
}

/// How a chat turn is answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Plain,
    WebSearch,
    Reasoning,
}

impl ChatMode {
    /// The model slot used to produce the final reply in this mode.
    pub fn model(self) -> ModelChoice {
        match self {
            ChatMode::Reasoning => ModelChoice::Reasoning,
            ChatMode::Plain | ChatMode::WebSearch => ModelChoice::Default,
        }
    }
}

/// Which configured model a request should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Default,
    /// The slower "thinking" model, whose replies may carry a thought block.
    Reasoning,
}

/// The canned instructions offered once a document has been uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Summarize,
    MakeQuiz,
    Explain,
    Roadmap,
}

impl QuickAction {
    pub fn instruction(self) -> &'static str {
        match self {
            QuickAction::Summarize => {
                "Please provide a concise and highly readable summary of the uploaded document."
            }
            QuickAction::MakeQuiz => {
                "Create a comprehensive quiz based only on the document content."
            }
            QuickAction::Explain => {
                "Explain the key concepts and important ideas in the uploaded document."
            }
            QuickAction::Roadmap => {
                "Based on the uploaded content, create a structured learning roadmap."
            }
        }
    }
}

/// Languages offered by the voice overview generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
        }
    }
}

/// One ranked result returned by the search client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub snippet: String,
    pub source: String,
    pub link: String,
}

/// The kinds of study material a user can upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
}

impl DocumentKind {
    /// Picks the document kind from an uploaded file's name.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            Some(DocumentKind::Pdf)
        } else if lower.ends_with(".docx") {
            Some(DocumentKind::Word)
        } else {
            None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Word => "Word",
        }
    }
}
