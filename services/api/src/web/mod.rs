pub mod auth;
pub mod chat_task;
pub mod middleware;
pub mod profile_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod voice_task;
pub mod ws_handler;

// Re-export the main handlers to make them easily accessible
// to the binary that will build the web server router.
pub use middleware::require_auth;
pub use rest::{get_profile_handler, update_profile_handler};
pub use ws_handler::ws_handler;
