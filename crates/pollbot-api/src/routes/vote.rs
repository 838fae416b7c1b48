use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pollbot_core::{AppState, PollError};

use crate::error::ApiError;
use crate::pages::Page;
use crate::session::VoterSession;

/// Vote links carry the token as the whole query with an empty key
/// (`?=<token>`); a `token=` parameter is accepted as well.
fn token_from_query(query: &str) -> Option<String> {
    let encoded = match query.strip_prefix('=') {
        Some(rest) => rest,
        None => query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))?,
    };
    if encoded.is_empty() {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|token| token.into_owned())
}

pub async fn cast_vote(
    State(state): State<AppState>,
    VoterSession(voter): VoterSession,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let token = query
        .as_deref()
        .and_then(token_from_query)
        .ok_or(ApiError::VoteRejected)?;

    match state.engine.record_vote(&token, voter.as_deref()).await {
        Ok(receipt) => Ok(Page::new(
            "Vote recorded",
            format!(
                "Your vote for option {} has been recorded. You can close this page.",
                receipt.vote.choice
            ),
        )
        .into_response()),
        Err(PollError::TransportFailure(err)) => {
            tracing::warn!("vote recorded but results edit failed: {err}");
            Ok((
                StatusCode::ACCEPTED,
                Page::new(
                    "Vote recorded",
                    "Your vote has been recorded, but the results message could not be \
                     updated yet. It will catch up with the next vote.",
                ),
            )
                .into_response())
        }
        Err(err) => Err(err.into()),
    }
}
