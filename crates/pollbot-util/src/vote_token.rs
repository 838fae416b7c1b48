//! Reversible encoding of a vote into an opaque, URL-embeddable string.
//!
//! Encoding happens in two independent stages. [`VoteToken::encode`] turns
//! `(poll, choice)` into a base64 token, and [`VoteToken::link`] URL-escapes
//! that token into a vote link. Escaping the link for a particular chat
//! renderer is a third, separate step (see [`crate::markup`]).

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use pollbot_models::PollRef;
use thiserror::Error;

pub const VOTE_PATH: &str = "/pollbot/vote";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VoteTokenError {
    #[error("malformed vote token")]
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteToken {
    pub poll_ref: PollRef,
    pub choice: u32,
}

impl VoteToken {
    pub fn new(poll_ref: PollRef, choice: u32) -> Self {
        Self { poll_ref, choice }
    }

    pub fn encode(&self) -> String {
        let payload = serde_json::json!([
            self.poll_ref.conversation_id,
            self.poll_ref.prompt_message_id,
            self.choice,
        ]);
        BASE64_STANDARD.encode(payload.to_string())
    }

    /// Decode a token produced by [`VoteToken::encode`].
    ///
    /// Only the canonical encoding is accepted, so two different strings never
    /// decode to the same vote.
    pub fn decode(raw: &str) -> Result<Self, VoteTokenError> {
        let bytes = BASE64_STANDARD
            .decode(raw)
            .map_err(|_| VoteTokenError::Malformed)?;
        let (conversation_id, prompt_message_id, choice): (String, i64, u32) =
            serde_json::from_slice(&bytes).map_err(|_| VoteTokenError::Malformed)?;
        if conversation_id.is_empty() || choice == 0 {
            return Err(VoteTokenError::Malformed);
        }

        let token = Self::new(PollRef::new(conversation_id, prompt_message_id), choice);
        if token.encode() != raw {
            return Err(VoteTokenError::Malformed);
        }
        Ok(token)
    }

    /// Full vote link under `http_prefix`, with the token query-escaped.
    pub fn link(&self, http_prefix: &str) -> String {
        format!(
            "{}{}?={}",
            http_prefix.trim_end_matches('/'),
            VOTE_PATH,
            urlencoding::encode(&self.encode())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::escape_percent;

    fn token(choice: u32) -> VoteToken {
        VoteToken::new(PollRef::new("conv-abc", 42), choice)
    }

    #[test]
    fn decode_returns_the_encoded_vote() {
        for choice in 1..=10 {
            let original = token(choice);
            let decoded = VoteToken::decode(&original.encode()).expect("decode");
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn distinct_votes_encode_differently() {
        let a = token(1).encode();
        let b = token(2).encode();
        let c = VoteToken::new(PollRef::new("conv-abc", 43), 1).encode();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "not base64!", "aGVsbG8=", "W10=", "e30="] {
            assert_eq!(VoteToken::decode(raw), Err(VoteTokenError::Malformed), "{raw}");
        }
    }

    #[test]
    fn rejects_wrong_arity_and_zero_choice() {
        let two_fields = BASE64_STANDARD.encode(r#"["conv",1]"#);
        let four_fields = BASE64_STANDARD.encode(r#"["conv",1,1,1]"#);
        let zero_choice = BASE64_STANDARD.encode(r#"["conv",1,0]"#);
        let negative_choice = BASE64_STANDARD.encode(r#"["conv",1,-1]"#);
        for raw in [two_fields, four_fields, zero_choice, negative_choice] {
            assert_eq!(VoteToken::decode(&raw), Err(VoteTokenError::Malformed));
        }
    }

    #[test]
    fn rejects_non_canonical_json() {
        let spaced = BASE64_STANDARD.encode(r#"[ "conv-abc", 42, 1 ]"#);
        assert_eq!(VoteToken::decode(&spaced), Err(VoteTokenError::Malformed));
    }

    #[test]
    fn link_survives_query_decoding() {
        let original = VoteToken::new(PollRef::new("conv+/=", 7), 3);
        let link = original.link("https://polls.example.com/");
        let (prefix, escaped) = link.split_once("?=").expect("query");
        assert_eq!(prefix, "https://polls.example.com/pollbot/vote");
        assert!(!escaped.contains('+') && !escaped.contains('/') && !escaped.contains('='));
        let unescaped = urlencoding::decode(escaped).expect("utf8");
        assert_eq!(VoteToken::decode(&unescaped).expect("decode"), original);
    }

    #[test]
    fn chat_escaped_link_renders_back_to_the_link() {
        let link = token(2).link("https://polls.example.com");
        let escaped = escape_percent(&link);
        assert_eq!(escaped.replace("%%", "%"), link);
    }
}
