//! Configuration management for the task board server.
//!
//! Configuration is read from environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `DEV_MODE` - Optional. When true, requests run as a fixed dev user without a token.
//! - `JWT_SECRET` - Required unless `DEV_MODE` is set. HS256 secret for bearer tokens.
//! - `BOARD_STORE` - Optional. `memory` or `sqlite`. Defaults to `sqlite`.
//! - `DATABASE_PATH` - Optional. SQLite file. Defaults to `taskboard.db`.
//! - `TEXTGEN_API_URL` - Optional. OpenAI-compatible chat completions endpoint.
//! - `TEXTGEN_API_KEY` - Optional. Enables the task assistant when set.
//! - `TEXTGEN_MODELS` - Optional. Comma-separated model fallback order.

use std::path::PathBuf;
use thiserror::Error;

use crate::store::BoardStoreType;
use crate::util::{env_var_bool, split_csv};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

pub const DEFAULT_TEXTGEN_API_URL: &str = "https://api.sambanova.ai/v1/chat/completions";

pub const DEFAULT_TEXTGEN_MODELS: &[&str] = &[
    "Meta-Llama-3.3-70B-Instruct",
    "Qwen3-32B",
    "DeepSeek-R1-Distill-Llama-70B",
];

/// Bearer token settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    /// Whether requests must carry a valid token.
    pub fn auth_required(&self, dev_mode: bool) -> bool {
        !dev_mode
    }
}

/// Text generation endpoint settings.
#[derive(Debug, Clone)]
pub struct TextGenConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Tried in order until one answers.
    pub models: Vec<String>,
}

impl Default for TextGenConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_TEXTGEN_API_URL.to_string(),
            api_key: None,
            models: DEFAULT_TEXTGEN_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl TextGenConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some() && !self.models.is_empty()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,

    pub port: u16,

    /// Skip token checks and act as a fixed dev user.
    pub dev_mode: bool,

    pub auth: AuthConfig,

    /// Which `BoardStore` backend to build
    pub store_type: BoardStoreType,

    /// SQLite database file (ignored by the memory store)
    pub database_path: PathBuf,

    pub textgen: TextGenConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `JWT_SECRET` is unset outside dev mode,
    /// and `ConfigError::InvalidValue` for unparseable numbers or store types.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let dev_mode = env_var_bool("DEV_MODE", false);

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if jwt_secret.is_none() && !dev_mode {
            return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
        }

        let store_type = std::env::var("BOARD_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse()
            .map_err(|e: String| ConfigError::InvalidValue("BOARD_STORE".to_string(), e))?;

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("taskboard.db"));

        let mut textgen = TextGenConfig::default();
        if let Ok(url) = std::env::var("TEXTGEN_API_URL") {
            textgen.api_url = url;
        }
        textgen.api_key = std::env::var("TEXTGEN_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if let Ok(models) = std::env::var("TEXTGEN_MODELS") {
            let models = split_csv(&models);
            if models.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "TEXTGEN_MODELS".to_string(),
                    "at least one model is required".to_string(),
                ));
            }
            textgen.models = models;
        }

        Ok(Self {
            host,
            port,
            dev_mode,
            auth: AuthConfig { jwt_secret },
            store_type,
            database_path,
            textgen,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(jwt_secret: Option<String>, store_type: BoardStoreType) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: false,
            auth: AuthConfig { jwt_secret },
            store_type,
            database_path: PathBuf::from("taskboard.db"),
            textgen: TextGenConfig::default(),
        }
    }
}
