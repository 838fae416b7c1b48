use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollbot_models::{Poll, PollMode, PollRef};
use sqlx::types::Json;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PollRow {
    pub conversation_id: String,
    pub prompt_message_id: i64,
    pub results_message_id: i64,
    pub prompt: String,
    pub options: Json<Vec<String>>,
    pub option_count: i64,
    pub mode: String,
    pub created_at: DateTime<Utc>,
}

impl PollRow {
    pub fn into_poll(self) -> Result<Poll, DbError> {
        let mode = PollMode::parse(&self.mode)
            .ok_or_else(|| DbError::Corrupt(format!("unknown poll mode '{}'", self.mode)))?;
        let options = self.options.0;
        if options.is_empty() || options.len() as i64 != self.option_count {
            return Err(DbError::Corrupt(format!(
                "poll {}/{} stores {} labels for option_count {}",
                self.conversation_id,
                self.prompt_message_id,
                options.len(),
                self.option_count
            )));
        }
        Ok(Poll {
            poll_ref: PollRef::new(self.conversation_id, self.prompt_message_id),
            prompt: self.prompt,
            options,
            results_message_id: self.results_message_id,
            mode,
            created_at: self.created_at,
        })
    }
}

pub async fn create_poll(pool: &DbPool, poll: &Poll) -> Result<PollRow, DbError> {
    let row = sqlx::query_as::<_, PollRow>(
        "INSERT INTO polls (
            conversation_id, prompt_message_id, results_message_id, prompt, options, option_count, mode, created_at
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         RETURNING conversation_id, prompt_message_id, results_message_id, prompt, options, option_count,
                   mode, created_at",
    )
    .bind(&poll.poll_ref.conversation_id)
    .bind(poll.poll_ref.prompt_message_id)
    .bind(poll.results_message_id)
    .bind(&poll.prompt)
    .bind(Json(&poll.options))
    .bind(poll.option_count() as i64)
    .bind(poll.mode.as_str())
    .bind(poll.created_at)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_poll(pool: &DbPool, poll_ref: &PollRef) -> Result<Option<PollRow>, DbError> {
    let row = sqlx::query_as::<_, PollRow>(
        "SELECT conversation_id, prompt_message_id, results_message_id, prompt, options, option_count,
                mode, created_at
         FROM polls
         WHERE conversation_id = ?1 AND prompt_message_id = ?2",
    )
    .bind(&poll_ref.conversation_id)
    .bind(poll_ref.prompt_message_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
