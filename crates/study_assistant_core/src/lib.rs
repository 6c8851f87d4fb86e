pub mod context;
pub mod domain;
pub mod ports;
pub mod profile;
pub mod search;
pub mod session;
pub mod stream;
pub mod turn;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    ChatMode, DocumentKind, Language, Message, ModelChoice, NewUser, ProfileFields, QuickAction,
    Role, SearchSnippet, UserCredentials, UserProfile,
};
pub use ports::{
    DatabaseService, LanguageModelService, LlmError, PortError, PortResult, SearchService,
    TextStream, TextToSpeechService,
};
pub use session::SessionState;
