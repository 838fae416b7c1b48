use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    pub polls: PollsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Base URL users reach this service at. Vote and login links start with it.
    pub public_url: String,
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            public_url: "http://localhost:8090".to_string(),
            max_concurrent_requests: 512,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/pollbot.db?mode=rwc".to_string(),
            max_connections: 8,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Secret for signing session cookies. Generated per process when unset.
    pub session_secret: Option<String>,
    pub session_ttl_seconds: u64,
    pub login_token_ttl_seconds: u64,
    pub secure_cookies: bool,
    pub purge_interval_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_seconds: 30 * 24 * 3600,
            login_token_ttl_seconds: 3600,
            secure_cookies: false,
            purge_interval_seconds: 600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub bridge_url: String,
    /// Bearer token for calls to the bridge and the expected value of the
    /// bridge's `X-Pollbot-Bridge-Token` header.
    pub bridge_token: Option<String>,
    pub bot_username: String,
    pub request_timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:8091/".to_string(),
            bridge_token: None,
            bot_username: "pollbot".to_string(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollsConfig {
    pub edit_retries: u32,
    pub edit_backoff_ms: u64,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            edit_retries: 2,
            edit_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable output.
    pub json: bool,
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist,
    /// then apply `POLLBOT_*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {path}"))?;
            Self::from_toml(&raw).with_context(|| format!("invalid config file {path}"))?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = lookup("POLLBOT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = lookup("POLLBOT_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(secret) = lookup("POLLBOT_SESSION_SECRET") {
            self.auth.session_secret = Some(secret);
        }
        if let Some(token) = lookup("POLLBOT_BRIDGE_TOKEN") {
            self.chat.bridge_token = Some(token);
        }
    }
}
