pub mod commands;
pub mod engine;
pub mod error;
pub mod login;
pub mod observability;
pub mod render;
pub mod transport;

pub use error::PollError;

use commands::CommandDispatcher;
use engine::{EngineConfig, PollEngine};
use login::LoginTokenIssuer;
use pollbot_db::DbPool;
use std::sync::Arc;
use std::time::Duration;
use transport::DynTransport;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Public base URL of this service (e.g. https://polls.example.com).
    /// Vote and login links are built on it.
    pub public_url: String,
    pub session_secret: String,
    pub session_ttl_seconds: u64,
    pub login_token_ttl_seconds: u64,
    /// Shared secret the chat bridge sends with every event. None disables
    /// the events endpoint.
    pub bridge_token: Option<String>,
    pub bot_username: String,
    pub edit_retries: u32,
    pub edit_backoff_ms: u64,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub engine: Arc<PollEngine>,
    pub issuer: LoginTokenIssuer,
    pub dispatcher: Arc<CommandDispatcher>,
}

impl AppState {
    pub fn new(db: DbPool, transport: DynTransport, config: AppConfig) -> Self {
        let engine = Arc::new(PollEngine::new(
            db.clone(),
            transport.clone(),
            EngineConfig {
                http_prefix: config.public_url.clone(),
                edit_retries: config.edit_retries,
                edit_backoff: Duration::from_millis(config.edit_backoff_ms),
            },
        ));
        let issuer = LoginTokenIssuer::new(
            db.clone(),
            Duration::from_secs(config.login_token_ttl_seconds),
        );
        let dispatcher = Arc::new(CommandDispatcher::new(
            engine.clone(),
            issuer.clone(),
            transport,
            config.public_url.clone(),
            config.bot_username.clone(),
        ));
        Self {
            db,
            config,
            engine,
            issuer,
            dispatcher,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::AppConfig;
    use pollbot_db::DbPool;

    /// In-memory database with migrations applied. A single connection keeps
    /// every query on the same memory database.
    pub async fn test_pool() -> DbPool {
        let pool = pollbot_db::create_pool("sqlite::memory:", 1)
            .await
            .expect("in-memory pool");
        pollbot_db::run_migrations(&pool)
            .await
            .expect("migrations");
        pool
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            public_url: "https://polls.example.com".to_string(),
            session_secret: "test-session-secret".to_string(),
            session_ttl_seconds: 3600,
            login_token_ttl_seconds: 3600,
            bridge_token: Some("bridge-secret".to_string()),
            bot_username: "pollbot".to_string(),
            edit_retries: 0,
            edit_backoff_ms: 0,
            secure_cookies: false,
        }
    }
}
