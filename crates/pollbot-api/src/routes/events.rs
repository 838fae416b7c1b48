use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use pollbot_core::AppState;
use pollbot_models::ChatEvent;
use pollbot_util::tokens::timing_safe_eq;
use serde_json::{json, Value};

use crate::error::ApiError;

pub const BRIDGE_TOKEN_HEADER: &str = "x-pollbot-bridge-token";

fn verify_bridge_token(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let Some(expected) = state.config.bridge_token.as_deref() else {
        return Err(ApiError::ServiceUnavailable(
            "chat events are not configured".into(),
        ));
    };
    let presented = headers
        .get(BRIDGE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    if !timing_safe_eq(presented, expected) {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Chat events relayed by the bridge. Dispatch failures are reported in the
/// conversation and logged here; the bridge always gets 202 so it does not
/// redeliver and duplicate a poll.
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<ChatEvent>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    verify_bridge_token(&headers, &state)?;

    if let Err(err) = state.dispatcher.handle_event(&event).await {
        tracing::error!("failed to handle chat event: {err}");
    }
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}
