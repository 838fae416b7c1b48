//! Voter sessions: a signed JWT in an HttpOnly cookie, set by the login
//! endpoint and read on every vote.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pollbot_core::AppState;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

pub const SESSION_COOKIE: &str = "pollbot_session";

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Voter username.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn create_session_token(
    username: &str,
    secret: &str,
    ttl_seconds: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: username.to_string(),
        iat: now,
        exp: now.saturating_add(i64::try_from(ttl_seconds).unwrap_or(i64::MAX)),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn validate_session_token(
    token: &str,
    secret: &str,
) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Identity bound to the request's session cookie, if it carries a valid one.
/// Never rejects: a missing identity is for the vote flow to act on.
pub struct VoterSession(pub Option<String>);

impl FromRequestParts<AppState> for VoterSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(VoterSession(None));
        };
        match validate_session_token(cookie.value(), &state.config.session_secret) {
            Ok(claims) if !claims.sub.is_empty() => Ok(VoterSession(Some(claims.sub))),
            Ok(_) => Ok(VoterSession(None)),
            Err(err) => {
                tracing::debug!("ignoring invalid session cookie: {err}");
                Ok(VoterSession(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trips_username() {
        let token = create_session_token("alice", "secret", 60).expect("token");
        let claims = validate_session_token(&token, "secret").expect("claims");
        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn session_token_rejects_wrong_secret() {
        let token = create_session_token("alice", "secret", 60).expect("token");
        assert!(validate_session_token(&token, "other").is_err());
    }

    #[test]
    fn cookie_is_http_only_and_lax() {
        let cookie = session_cookie("value".into(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(true));
    }
}
