//! Single-use login tokens binding a browser session to a chat identity.
//!
//! The issuer trusts whatever username it is asked to issue for. It must only
//! be reached from a direct conversation with that user on the chat network,
//! where the transport has already authenticated the recipient; possessing
//! the delivered link is then proof of identity.

use crate::error::PollError;
use crate::observability;
use chrono::Utc;
use pollbot_db::{login_tokens, DbPool};
use pollbot_util::tokens::{generate_login_token, hash_token};
use std::time::Duration;

const PURGE_BATCH: i64 = 1_000;

#[derive(Clone)]
pub struct LoginTokenIssuer {
    db: DbPool,
    ttl: Duration,
}

impl LoginTokenIssuer {
    pub fn new(db: DbPool, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    fn ttl_seconds(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }

    /// Create and persist a fresh token for `username`. Only the token's hash
    /// is stored; the returned plaintext is what goes into the login link.
    pub async fn issue(&self, username: &str) -> Result<String, PollError> {
        let token = generate_login_token();
        let issued_at = Utc::now().timestamp();
        let expires_at = issued_at.saturating_add(self.ttl_seconds());
        login_tokens::create_login_token(
            &self.db,
            &hash_token(&token),
            username,
            issued_at,
            expires_at,
        )
        .await?;
        observability::login_token_issued();
        tracing::info!(username, expires_at, "login token issued");
        Ok(token)
    }

    /// Consume `token` and return its bound username.
    pub async fn verify(&self, token: &str) -> Result<String, PollError> {
        self.consume(token, None).await
    }

    /// Like [`verify`](Self::verify), but the token is only consumed when it
    /// is bound to `username`. A mismatch reports `TokenNotFound`.
    pub async fn verify_for(&self, token: &str, username: &str) -> Result<String, PollError> {
        self.consume(token, Some(username)).await
    }

    async fn consume(&self, token: &str, username: Option<&str>) -> Result<String, PollError> {
        if token.is_empty() {
            return Err(PollError::TokenNotFound);
        }
        let token_hash = hash_token(token);
        let now = Utc::now().timestamp();

        if let Some(row) =
            login_tokens::consume_login_token(&self.db, &token_hash, username, now).await?
        {
            observability::login_verified();
            tracing::info!(username = %row.username, "login token verified");
            return Ok(row.username);
        }

        // The conditional update matched nothing; find out why.
        let Some(row) = login_tokens::get_login_token(&self.db, &token_hash).await? else {
            return Err(PollError::TokenNotFound);
        };
        if username.is_some_and(|expected| expected != row.username) {
            tracing::warn!("login token presented with a different username");
            return Err(PollError::TokenNotFound);
        }
        if row.is_consumed() {
            return Err(PollError::TokenAlreadyUsed);
        }
        if row.is_expired(now) {
            return Err(PollError::TokenExpired);
        }
        // Consumed by a concurrent caller between the two statements.
        Err(PollError::TokenAlreadyUsed)
    }

    /// Delete expired tokens and tokens consumed more than one TTL ago.
    pub async fn purge(&self) -> Result<u64, PollError> {
        let now = Utc::now().timestamp();
        let consumed_before = now.saturating_sub(self.ttl_seconds());
        let removed =
            login_tokens::purge_login_tokens(&self.db, now, consumed_before, PURGE_BATCH).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged stale login tokens");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_pool;

    async fn issuer(ttl: Duration) -> LoginTokenIssuer {
        LoginTokenIssuer::new(test_pool().await, ttl)
    }

    #[tokio::test]
    async fn verify_succeeds_once_then_reports_already_used() {
        let issuer = issuer(Duration::from_secs(3600)).await;
        let token = issuer.issue("alice").await.expect("issue");

        assert_eq!(issuer.verify(&token).await.expect("first"), "alice");
        let err = issuer.verify(&token).await.unwrap_err();
        assert!(matches!(err, PollError::TokenAlreadyUsed));
    }

    #[tokio::test]
    async fn concurrent_verification_succeeds_at_most_once() {
        let issuer = issuer(Duration::from_secs(3600)).await;
        let token = issuer.issue("alice").await.expect("issue");

        let (a, b) = tokio::join!(issuer.verify(&token), issuer.verify(&token));
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = if a.is_ok() { b } else { a };
        assert!(matches!(failure, Err(PollError::TokenAlreadyUsed)));
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let issuer = issuer(Duration::from_secs(3600)).await;
        assert!(matches!(
            issuer.verify("never-issued").await,
            Err(PollError::TokenNotFound)
        ));
        assert!(matches!(issuer.verify("").await, Err(PollError::TokenNotFound)));
    }

    #[tokio::test]
    async fn username_mismatch_leaves_token_usable() {
        let issuer = issuer(Duration::from_secs(3600)).await;
        let token = issuer.issue("alice").await.expect("issue");

        assert!(matches!(
            issuer.verify_for(&token, "mallory").await,
            Err(PollError::TokenNotFound)
        ));
        assert_eq!(
            issuer.verify_for(&token, "alice").await.expect("verify"),
            "alice"
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let issuer = issuer(Duration::ZERO).await;
        let token = issuer.issue("alice").await.expect("issue");
        assert!(matches!(
            issuer.verify(&token).await,
            Err(PollError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn purge_removes_expired_tokens() {
        let issuer = issuer(Duration::ZERO).await;
        issuer.issue("alice").await.expect("issue");
        issuer.issue("bob").await.expect("issue");
        assert_eq!(issuer.purge().await.expect("purge"), 2);
        assert_eq!(issuer.purge().await.expect("purge"), 0);
    }

    #[tokio::test]
    async fn tokens_are_stored_hashed() {
        let issuer = issuer(Duration::from_secs(60)).await;
        let token = issuer.issue("alice").await.expect("issue");
        let stored = login_tokens::get_login_token(&issuer.db, &token)
            .await
            .expect("query");
        assert!(stored.is_none());
        let stored = login_tokens::get_login_token(&issuer.db, &hash_token(&token))
            .await
            .expect("query")
            .expect("row");
        assert_eq!(stored.username, "alice");
    }
}
