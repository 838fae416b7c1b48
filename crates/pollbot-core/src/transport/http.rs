//! Chat bridge client.
//!
//! Talks JSON over HTTP to a bridge process that owns the actual chat
//! session:
//!
//! - `POST   {base}/conversations/{conv}/messages`                  `{"text"}` -> `{"id"}`
//! - `PATCH  {base}/conversations/{conv}/messages/{id}`             `{"text"}`
//! - `POST   {base}/conversations/{conv}/messages/{id}/reactions`   `{"reaction"}`

use super::{ChatTransport, MessageId, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: MessageId,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::Request(format!("invalid bridge url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Request(format!(
                "bridge url {base_url} cannot be a base"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Request("bridge url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageId, TransportError> {
        let url = self.endpoint(&["conversations", conversation_id, "messages"])?;
        let response = self
            .execute(
                self.client
                    .post(url)
                    .json(&serde_json::json!({ "text": text })),
            )
            .await?;
        let sent: SentMessage = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(sent.id)
    }

    async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        let id = message_id.to_string();
        let url = self.endpoint(&["conversations", conversation_id, "messages", &id])?;
        self.execute(
            self.client
                .patch(url)
                .json(&serde_json::json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn attach_reaction(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        marker: &str,
    ) -> Result<(), TransportError> {
        let id = message_id.to_string();
        let url = self.endpoint(&[
            "conversations",
            conversation_id,
            "messages",
            &id,
            "reactions",
        ])?;
        self.execute(
            self.client
                .post(url)
                .json(&serde_json::json!({ "reaction": marker })),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{header, HeaderMap, Method, StatusCode, Uri},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Recorded {
        method: Method,
        path: String,
        authorization: Option<String>,
        body: Value,
    }

    /// In-process bridge that records every request and answers with a
    /// fixed status and body.
    #[derive(Clone)]
    struct StubBridge {
        requests: Arc<Mutex<Vec<Recorded>>>,
        status: StatusCode,
        reply: String,
    }

    impl StubBridge {
        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    async fn record(
        State(bridge): State<StubBridge>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        bridge.requests.lock().expect("requests lock").push(Recorded {
            method,
            path: uri.path().to_string(),
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: serde_json::from_str(&body).unwrap_or(Value::Null),
        });
        (bridge.status, bridge.reply.clone())
    }

    async fn spawn_bridge(status: StatusCode, reply: &str) -> (String, StubBridge) {
        let bridge = StubBridge {
            requests: Arc::default(),
            status,
            reply: reply.to_string(),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().fallback(record).with_state(bridge.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/bridge/"), bridge)
    }

    fn transport(base_url: &str, token: Option<&str>) -> HttpTransport {
        HttpTransport::new(base_url, token.map(str::to_string), Duration::from_secs(5))
            .expect("transport")
    }

    #[tokio::test]
    async fn send_posts_text_with_bearer_and_parses_id() {
        let (base, bridge) = spawn_bridge(StatusCode::OK, r#"{"id": 42}"#).await;
        let id = transport(&base, Some("bridge-secret"))
            .send_message("team", "Poll: *Lunch?*")
            .await
            .expect("send");
        assert_eq!(id, 42);

        let requests = bridge.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].path, "/bridge/conversations/team/messages");
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer bridge-secret"));
        assert_eq!(requests[0].body, json!({ "text": "Poll: *Lunch?*" }));
    }

    #[tokio::test]
    async fn edit_patches_and_react_posts_marker() {
        let (base, bridge) = spawn_bridge(StatusCode::NO_CONTENT, "").await;
        let transport = transport(&base, None);
        transport
            .edit_message("team", 7, "*Results*")
            .await
            .expect("edit");
        transport
            .attach_reaction("team", 7, "1\u{fe0f}\u{20e3}")
            .await
            .expect("react");

        let requests = bridge.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(requests[0].path, "/bridge/conversations/team/messages/7");
        assert_eq!(requests[0].body, json!({ "text": "*Results*" }));
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "/bridge/conversations/team/messages/7/reactions");
        assert_eq!(requests[1].body, json!({ "reaction": "1\u{fe0f}\u{20e3}" }));
        assert!(requests.iter().all(|r| r.authorization.is_none()));
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let (base, _bridge) = spawn_bridge(StatusCode::BAD_GATEWAY, "bridge down").await;
        let err = transport(&base, None)
            .edit_message("team", 7, "*Results*")
            .await
            .expect_err("must fail");
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "bridge down");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_send_reply_is_invalid_response() {
        let (base, _bridge) = spawn_bridge(StatusCode::OK, "not json").await;
        let err = transport(&base, None)
            .send_message("team", "hello")
            .await
            .expect_err("must fail");
        assert!(matches!(err, TransportError::InvalidResponse(_)), "{err:?}");
    }

    #[test]
    fn endpoint_escapes_conversation_ids() {
        let transport =
            HttpTransport::new("http://bridge.local/api/", None, Duration::from_secs(5))
                .expect("transport");
        let url = transport
            .endpoint(&["conversations", "team/general", "messages", "12"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://bridge.local/api/conversations/team%2Fgeneral/messages/12"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        let err = HttpTransport::new("mailto:bot@example.com", None, Duration::from_secs(5))
            .expect_err("must fail");
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[test]
    fn blank_token_is_dropped() {
        let transport = HttpTransport::new(
            "http://bridge.local",
            Some("  ".to_string()),
            Duration::from_secs(5),
        )
        .expect("transport");
        assert!(transport.token.is_none());
    }
}
