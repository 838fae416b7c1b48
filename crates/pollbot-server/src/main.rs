use anyhow::{Context, Result};
use clap::Parser;
use pollbot_core::transport::http::HttpTransport;
use pollbot_core::{AppConfig, AppState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let mut config = config::Config::load(&args.config)?;

    init_tracing(config.logging.json);
    if !Path::new(&args.config).exists() {
        tracing::warn!("config file {} not found, using defaults", args.config);
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    // ── Database ─────────────────────────────────────────────────────────────
    ensure_sqlite_dir(&config.database.url)?;
    let db = pollbot_db::create_pool(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    pollbot_db::run_migrations(&db).await?;

    // ── Chat bridge ──────────────────────────────────────────────────────────
    let transport = HttpTransport::new(
        &config.chat.bridge_url,
        config.chat.bridge_token.clone(),
        Duration::from_secs(config.chat.request_timeout_seconds),
    )?;
    if config.chat.bridge_token.is_none() {
        tracing::warn!("no chat bridge token configured; the events endpoint is disabled");
    }

    let session_secret = match config.auth.session_secret.clone() {
        Some(secret) => secret,
        None => {
            tracing::warn!(
                "no session secret configured; generated a random one, sessions will not survive a restart"
            );
            pollbot_util::tokens::generate_secret()
        }
    };

    let state = AppState::new(
        db,
        Arc::new(transport),
        AppConfig {
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
            session_secret,
            session_ttl_seconds: config.auth.session_ttl_seconds,
            login_token_ttl_seconds: config.auth.login_token_ttl_seconds,
            bridge_token: config.chat.bridge_token.clone(),
            bot_username: config.chat.bot_username.clone(),
            edit_retries: config.polls.edit_retries,
            edit_backoff_ms: config.polls.edit_backoff_ms,
            secure_cookies: config.auth.secure_cookies,
        },
    );

    let purge_task = spawn_login_token_purge(
        state.clone(),
        Duration::from_secs(config.auth.purge_interval_seconds.max(1)),
    );

    let app = pollbot_api::build_router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests.max(1),
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;

    print_startup_banner(
        &config.server.bind_address,
        &config.server.public_url,
        &config.database.url,
        &config.chat.bridge_url,
    );

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        println!();
        tracing::info!("Shutting down...");
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    purge_task.abort();
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pollbot=info,tower_http=debug"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// SQLite creates the database file but not its directory.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {parent:?}"))?;
    }
    Ok(())
}

/// Periodically delete expired and long-consumed login tokens.
fn spawn_login_token_purge(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match state.issuer.purge().await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "purged stale login tokens"),
                Err(err) => tracing::warn!("login token purge failed: {err}"),
            }
        }
    })
}

fn print_startup_banner(bind_address: &str, public_url: &str, db_url: &str, bridge_url: &str) {
    println!();
    println!("  pollbot {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Listening:   http://{}", bind_address);
    println!("  Public URL:  {}", public_url);
    println!("  Database:    {}", db_url);
    println!("  Chat bridge: {}", bridge_url);
    println!();
}
