//! services/api/src/error.rs
//!
//! Startup failures of the API binary. Request-time failures never reach this
//! type; handlers map `PortError` to a status code or a WebSocket frame.

use crate::config::ConfigError;
use axum::http::header::InvalidHeaderValue;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting to Postgres or applying migrations failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ALLOWED_ORIGIN is not a valid header value: {0}")]
    InvalidOrigin(#[from] InvalidHeaderValue),

    /// Binding or serving the listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
