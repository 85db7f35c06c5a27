use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

use crate::services::ai::DEFAULT_MODEL;

pub const DEFAULT_SHARED_PASSWORD: &str = "password";
const MIN_SESSION_KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("SESSION_KEY must be base64")]
    SessionKeyEncoding,
    #[error("SESSION_KEY must decode to at least {MIN_SESSION_KEY_BYTES} bytes")]
    SessionKeyLength,
    #[error("AUTH_SHARED_PASSWORD must not be empty")]
    EmptyPassword,
    #[error("{0} must be a boolean, got {1:?}")]
    InvalidBool(&'static str, String),
}

/// Runtime configuration read from the environment (`.env` is loaded by `main`).
///
/// | Env Var                | Default                                 |
/// |------------------------|-----------------------------------------|
/// | `DATABASE_URL`         | unset: in-memory demo store             |
/// | `SESSION_KEY`          | random per process (base64 otherwise)   |
/// | `AUTH_SHARED_PASSWORD` | `password`                              |
/// | `OPENAI_API_KEY`       | unset: AI endpoints disabled            |
/// | `OPENAI_MODEL`         | `gpt-4o-mini`                           |
/// | `BIND_ADDR`            | `0.0.0.0:$PORT`, `PORT` defaults `3000` |
/// | `SEED_DEMO_DATA`       | `true` without a database, else `false` |
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub session_key: Vec<u8>,
    /// True when no `SESSION_KEY` was configured and one was generated.
    pub ephemeral_session_key: bool,
    pub shared_password: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub bind_addr: String,
    pub seed_demo_data: bool,
    /// Enables the `Secure` cookie attribute.
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL");

        let (session_key, ephemeral_session_key) = match get("SESSION_KEY") {
            Some(encoded) => {
                let key = general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| ConfigError::SessionKeyEncoding)?;
                if key.len() < MIN_SESSION_KEY_BYTES {
                    return Err(ConfigError::SessionKeyLength);
                }
                (key, false)
            }
            None => {
                let mut key = vec![0u8; MIN_SESSION_KEY_BYTES];
                rand::thread_rng().fill_bytes(&mut key);
                (key, true)
            }
        };

        let shared_password = match var("AUTH_SHARED_PASSWORD") {
            Some(p) if p.is_empty() => return Err(ConfigError::EmptyPassword),
            Some(p) => p,
            None => DEFAULT_SHARED_PASSWORD.to_string(),
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let seed_demo_data = match get("SEED_DEMO_DATA") {
            Some(raw) => parse_bool("SEED_DEMO_DATA", &raw)?,
            None => database_url.is_none(),
        };

        let production = ["RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME", "PRODUCTION"]
            .iter()
            .any(|key| var(key).is_some());

        Ok(Self {
            database_url,
            session_key,
            ephemeral_session_key,
            shared_password,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind_addr,
            seed_demo_data,
            production,
        })
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool(name, raw.to_string())),
    }
}
