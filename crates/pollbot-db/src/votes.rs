use crate::{DbError, DbPool};
use chrono::{DateTime, Utc};
use pollbot_models::{PollRef, Tally, Vote};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VoteRow {
    pub conversation_id: String,
    pub prompt_message_id: i64,
    pub voter: String,
    pub choice: i64,
    pub updated_at: DateTime<Utc>,
}

impl VoteRow {
    pub fn into_vote(self) -> Result<Vote, DbError> {
        let choice = u32::try_from(self.choice)
            .map_err(|_| DbError::Corrupt(format!("vote choice {} out of range", self.choice)))?;
        Ok(Vote {
            poll_ref: PollRef::new(self.conversation_id, self.prompt_message_id),
            voter: self.voter,
            choice,
            updated_at: self.updated_at,
        })
    }
}

/// Insert or overwrite the voter's choice in a single statement, so at most
/// one row exists per (poll, voter) however many submissions race.
pub async fn upsert_vote(
    pool: &DbPool,
    poll_ref: &PollRef,
    voter: &str,
    choice: u32,
    now: DateTime<Utc>,
) -> Result<VoteRow, DbError> {
    let row = sqlx::query_as::<_, VoteRow>(
        "INSERT INTO votes (conversation_id, prompt_message_id, voter, choice, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (conversation_id, prompt_message_id, voter)
         DO UPDATE SET choice = excluded.choice, updated_at = excluded.updated_at
         RETURNING conversation_id, prompt_message_id, voter, choice, updated_at",
    )
    .bind(&poll_ref.conversation_id)
    .bind(poll_ref.prompt_message_id)
    .bind(voter)
    .bind(i64::from(choice))
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Count votes per option from the current rows. The aggregate is a single
/// statement and therefore reads one consistent snapshot.
pub async fn tally_votes(
    pool: &DbPool,
    poll_ref: &PollRef,
    option_count: usize,
) -> Result<Tally, DbError> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT choice, COUNT(*)
         FROM votes
         WHERE conversation_id = ?1 AND prompt_message_id = ?2
         GROUP BY choice
         ORDER BY choice ASC",
    )
    .bind(&poll_ref.conversation_id)
    .bind(poll_ref.prompt_message_id)
    .fetch_all(pool)
    .await?;

    let mut tally = Tally::empty(option_count);
    for (choice, count) in rows {
        let choice = u32::try_from(choice)
            .map_err(|_| DbError::Corrupt(format!("vote choice {choice} out of range")))?;
        if !tally.add(choice, count.max(0) as u64) {
            tracing::warn!(
                poll = %poll_ref,
                choice,
                option_count,
                "ignoring stored votes outside the option range"
            );
        }
    }
    Ok(tally)
}
