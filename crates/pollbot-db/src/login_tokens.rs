use crate::{DbError, DbPool};

/// Login tokens are stored by hash with unix-second timestamps, so expiry can
/// be compared numerically inside the consuming UPDATE.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LoginTokenRow {
    pub token_hash: String,
    pub username: String,
    pub issued_at: i64,
    pub expires_at: i64,
    pub consumed_at: Option<i64>,
}

impl LoginTokenRow {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

pub async fn create_login_token(
    pool: &DbPool,
    token_hash: &str,
    username: &str,
    issued_at: i64,
    expires_at: i64,
) -> Result<LoginTokenRow, DbError> {
    let row = sqlx::query_as::<_, LoginTokenRow>(
        "INSERT INTO login_tokens (token_hash, username, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING token_hash, username, issued_at, expires_at, consumed_at",
    )
    .bind(token_hash)
    .bind(username)
    .bind(issued_at)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_login_token(
    pool: &DbPool,
    token_hash: &str,
) -> Result<Option<LoginTokenRow>, DbError> {
    let row = sqlx::query_as::<_, LoginTokenRow>(
        "SELECT token_hash, username, issued_at, expires_at, consumed_at
         FROM login_tokens
         WHERE token_hash = ?1",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Test-and-set: marks the token consumed only if it is unconsumed, unexpired
/// and, when `username` is given, bound to that username. Of any number of
/// concurrent callers at most one receives `Some`.
pub async fn consume_login_token(
    pool: &DbPool,
    token_hash: &str,
    username: Option<&str>,
    now: i64,
) -> Result<Option<LoginTokenRow>, DbError> {
    let row = sqlx::query_as::<_, LoginTokenRow>(
        "UPDATE login_tokens
         SET consumed_at = ?3
         WHERE token_hash = ?1
           AND (?2 IS NULL OR username = ?2)
           AND consumed_at IS NULL
           AND expires_at > ?3
         RETURNING token_hash, username, issued_at, expires_at, consumed_at",
    )
    .bind(token_hash)
    .bind(username)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete tokens that can no longer be used: expired, or consumed before
/// `consumed_before`.
pub async fn purge_login_tokens(
    pool: &DbPool,
    now: i64,
    consumed_before: i64,
    limit: i64,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM login_tokens
         WHERE token_hash IN (
             SELECT token_hash FROM login_tokens
             WHERE expires_at <= ?1
                OR (consumed_at IS NOT NULL AND consumed_at <= ?2)
             LIMIT ?3
         )",
    )
    .bind(now)
    .bind(consumed_before)
    .bind(limit)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
