pub mod error;
pub mod pages;
pub mod routes;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};
use pollbot_core::AppState;
use pollbot_util::tokens::LOGIN_PATH;
use pollbot_util::vote_token::VOTE_PATH;
use tower_http::trace::TraceLayer;

pub const EVENTS_PATH: &str = "/pollbot/events";
pub const HEALTH_PATH: &str = "/pollbot/health";

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route(VOTE_PATH, get(routes::vote::cast_vote))
        .route(LOGIN_PATH, get(routes::login::login))
        .route(EVENTS_PATH, post(routes::events::receive_event))
        .route(HEALTH_PATH, get(routes::health::health))
        .layer(TraceLayer::new_for_http())
}
