//! Minimal HTML pages for browser-facing endpoints.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

#[derive(Template)]
#[template(path = "page.html")]
pub struct Page {
    pub title: &'static str,
    pub message: String,
}

impl Page {
    pub fn new(title: &'static str, message: impl Into<String>) -> Self {
        Self {
            title,
            message: message.into(),
        }
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("failed to render page {:?}: {err}", self.title);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
