pub mod chat_llm;
pub mod db;
pub mod extract;
pub mod search;
pub mod tts;

pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use search::SerpApiAdapter;
pub use tts::ElevenLabsTtsAdapter;
