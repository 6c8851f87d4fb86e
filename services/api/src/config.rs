//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::Duration;
use std::collections::HashMap;
use std::net::SocketAddr;
use study_assistant_core::profile::DEFAULT_COOLDOWN_SECS;
use tracing::Level;

const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for the optional ElevenLabs speech adapter.
#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub allowed_origin: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub chat_model: String,
    pub reasoning_model: String,
    pub serpapi_api_key: Option<String>,
    pub speech: Option<SpeechConfig>,
    pub profile_update_cooldown: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(std::env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let var = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();
        let required =
            |name: &str| var(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()));
        let or_default = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = or_default("ALLOWED_ORIGIN", "http://localhost:3000");

        // --- Language Model ---
        let llm_api_key = required("LLM_API_KEY")?;
        let llm_base_url = or_default("LLM_BASE_URL", GEMINI_OPENAI_BASE_URL);
        let chat_model = or_default("CHAT_MODEL", "gemini-2.5-flash");
        let reasoning_model = or_default("REASONING_MODEL", "gemini-2.5-pro");

        // --- Optional Providers ---
        let serpapi_api_key = var("SERPAPI_API_KEY");
        let speech = var("ELEVENLABS_API_KEY")
            .map(|api_key| -> Result<SpeechConfig, ConfigError> {
                Ok(SpeechConfig {
                    api_key,
                    voice_id: required("TTS_VOICE_ID")?,
                    model_id: or_default("TTS_MODEL_ID", "eleven_multilingual_v2"),
                    output_format: or_default("TTS_OUTPUT_FORMAT", "mp3_44100_128"),
                })
            })
            .transpose()?;

        let cooldown_str = or_default(
            "PROFILE_UPDATE_COOLDOWN_SECS",
            &DEFAULT_COOLDOWN_SECS.to_string(),
        );
        let profile_update_cooldown = cooldown_str
            .parse::<i64>()
            .ok()
            .filter(|s| *s >= 0)
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "PROFILE_UPDATE_COOLDOWN_SECS".to_string(),
                    format!("'{}' is not a number of seconds", cooldown_str),
                )
            })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            llm_api_key,
            llm_base_url,
            chat_model,
            reasoning_model,
            serpapi_api_key,
            speech,
            profile_update_cooldown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> HashMap<String, String> {
        HashMap::from([
            ("DATABASE_URL".to_string(), "postgres://localhost/asti".to_string()),
            ("LLM_API_KEY".to_string(), "test-key".to_string()),
        ])
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(minimal()).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.llm_base_url, GEMINI_OPENAI_BASE_URL);
        assert_eq!(config.chat_model, "gemini-2.5-flash");
        assert_eq!(config.profile_update_cooldown, Duration::seconds(300));
        assert!(config.serpapi_api_key.is_none());
        assert!(config.speech.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let mut vars = minimal();
        vars.remove("DATABASE_URL");
        assert!(matches!(
            Config::from_vars(vars),
            Err(ConfigError::MissingVar(name)) if name == "DATABASE_URL"
        ));
    }

    #[test]
    fn test_speech_requires_voice_id() {
        let mut vars = minimal();
        vars.insert("ELEVENLABS_API_KEY".to_string(), "el-key".to_string());
        assert!(matches!(
            Config::from_vars(vars.clone()),
            Err(ConfigError::MissingVar(name)) if name == "TTS_VOICE_ID"
        ));

        vars.insert("TTS_VOICE_ID".to_string(), "voice-123".to_string());
        let speech = Config::from_vars(vars).unwrap().speech.unwrap();
        assert_eq!(speech.model_id, "eleven_multilingual_v2");
        assert_eq!(speech.output_format, "mp3_44100_128");
    }

    #[test]
    fn test_invalid_cooldown() {
        let mut vars = minimal();
        vars.insert("PROFILE_UPDATE_COOLDOWN_SECS".to_string(), "-5".to_string());
        assert!(matches!(
            Config::from_vars(vars),
            Err(ConfigError::InvalidValue(..))
        ));
    }

    #[test]
    fn test_out_of_range_cooldown_is_rejected() {
        let mut vars = minimal();
        vars.insert(
            "PROFILE_UPDATE_COOLDOWN_SECS".to_string(),
            i64::MAX.to_string(),
        );
        assert!(matches!(
            Config::from_vars(vars),
            Err(ConfigError::InvalidValue(..))
        ));
    }
}
