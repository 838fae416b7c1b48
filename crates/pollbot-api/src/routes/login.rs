use axum::extract::{Query, State};
use axum_extra::extract::cookie::CookieJar;
use pollbot_core::AppState;
use serde::Deserialize;

use crate::error::ApiError;
use crate::pages::Page;
use crate::session::{create_session_token, session_cookie};

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub token: Option<String>,
    pub username: Option<String>,
}

/// Exchange a login link for a session cookie. Without a token this is the
/// landing page unauthenticated voters are redirected to.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(CookieJar, Page), ApiError> {
    let Some(token) = params.token.filter(|token| !token.is_empty()) else {
        return Ok((
            jar,
            Page::new(
                "Log in to vote",
                "To vote in anonymous polls, send the message `login` to the bot in a direct \
                 conversation and follow the link it replies with. Then click the vote link again.",
            ),
        ));
    };

    let username = match params.username.as_deref().filter(|name| !name.is_empty()) {
        Some(username) => state.issuer.verify_for(&token, username).await?,
        None => state.issuer.verify(&token).await?,
    };

    let session = create_session_token(
        &username,
        &state.config.session_secret,
        state.config.session_ttl_seconds,
    )
    .map_err(|err| ApiError::Internal(anyhow::anyhow!("failed to sign session: {err}")))?;
    let jar = jar.add(session_cookie(session, state.config.secure_cookies));

    Ok((
        jar,
        Page::new(
            "Logged in",
            format!(
                "You are logged in as {username}. You can now vote in anonymous polls by \
                 clicking the links in the poll messages."
            ),
        ),
    ))
}

#[cfg(test)]
mod tests {
    use crate::session::{validate_session_token, SESSION_COOKIE};
    use crate::test_support::{body_text, test_app};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use pollbot_util::tokens::login_link;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn login_link_sets_session_cookie_once() {
        let app = test_app().await;
        let token = app.state.issuer.issue("alice").await.expect("issue");
        let uri = login_link("", &token, "alice");

        let response = app.router.clone().oneshot(get(&uri)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("set-cookie")
            .to_string();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Lax"));
        let value = set_cookie
            .strip_prefix(&format!("{SESSION_COOKIE}="))
            .and_then(|rest| rest.split(';').next())
            .expect("cookie value");
        let claims = validate_session_token(value, "test-session-secret").expect("claims");
        assert_eq!(claims.sub, "alice");
        assert!(body_text(response).await.contains("logged in as alice"));

        let response = app.router.clone().oneshot(get(&uri)).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(response).await.contains("expired or was already used"));
    }

    #[tokio::test]
    async fn mismatched_username_is_rejected() {
        let app = test_app().await;
        let token = app.state.issuer.issue("alice").await.expect("issue");

        let response = app
            .router
            .clone()
            .oneshot(get(&login_link("", &token, "mallory")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The rightful owner can still use it.
        let response = app
            .router
            .clone()
            .oneshot(get(&login_link("", &token, "alice")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn bare_login_page_shows_instructions() {
        let app = test_app().await;
        let response = app
            .router
            .clone()
            .oneshot(get("/pollbot/login"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("direct conversation"));
    }
}
