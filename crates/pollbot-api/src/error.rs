use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use pollbot_core::PollError;
use pollbot_util::tokens::LOGIN_PATH;
use serde_json::{json, Value};
use thiserror::Error;

use crate::pages::Page;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The voter has no session; send the browser to the login flow.
    #[error("login required")]
    LoginRequired,
    #[error("vote could not be recorded")]
    VoteRejected,
    #[error("link expired or already used")]
    LoginLinkInvalid,
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Machine-readable error code string.
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::LoginRequired => "LOGIN_REQUIRED",
            ApiError::VoteRejected => "VOTE_REJECTED",
            ApiError::LoginLinkInvalid => "LOGIN_LINK_INVALID",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::LoginRequired => StatusCode::SEE_OTHER,
            ApiError::VoteRejected => StatusCode::BAD_REQUEST,
            ApiError::LoginLinkInvalid => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Browser-facing outcomes get a page, never internal detail.
        match &self {
            ApiError::LoginRequired => {
                return (status, [(header::LOCATION, LOGIN_PATH)]).into_response();
            }
            ApiError::VoteRejected => {
                return (
                    status,
                    Page::new("Vote not recorded", "Your vote could not be recorded."),
                )
                    .into_response();
            }
            ApiError::LoginLinkInvalid => {
                return (
                    status,
                    Page::new(
                        "Login failed",
                        "This login link has expired or was already used. \
                         Send `login` to the bot in a direct conversation to get a new one.",
                    ),
                )
                    .into_response();
            }
            _ => {}
        }

        let code = self.error_code();
        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "code": code,
            "message": message,
            "details": Value::Null,
        });

        (status, Json(body)).into_response()
    }
}

impl From<PollError> for ApiError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::MalformedToken | PollError::PollNotFound | PollError::InvalidChoice { .. } => {
                ApiError::VoteRejected
            }
            PollError::Unauthenticated => ApiError::LoginRequired,
            PollError::TokenNotFound | PollError::TokenAlreadyUsed | PollError::TokenExpired => {
                ApiError::LoginLinkInvalid
            }
            PollError::InvalidCommand(msg) => ApiError::BadRequest(msg),
            PollError::TransportFailure(err) => {
                tracing::warn!("chat transport failure: {err}");
                ApiError::ServiceUnavailable("chat transport unavailable".into())
            }
            PollError::PersistenceFailure(err) => ApiError::Internal(anyhow::anyhow!(err)),
        }
    }
}
