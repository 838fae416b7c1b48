//! Poll lifecycle: creation in either mode, vote recording and results
//! regeneration.
//!
//! Votes on the same poll are serialized through a per-poll async mutex
//! covering upsert, tally, render and edit. An edit therefore always carries a
//! tally at least as new as every vote acknowledged before it, and two edits of
//! one results message are never in flight at once. Different polls never
//! contend.

use crate::error::PollError;
use crate::observability;
use crate::render;
use crate::transport::DynTransport;
use chrono::Utc;
use dashmap::DashMap;
use pollbot_db::{polls, votes, DbPool};
use pollbot_models::{Poll, PollMode, PollRef, Tally, Vote};
use pollbot_util::markup::{number_emoji, MAX_OPTIONS};
use pollbot_util::vote_token::VoteToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Public base URL vote links are built on, e.g. `https://polls.example.com`.
    pub http_prefix: String,
    /// Extra attempts for a failed results edit.
    pub edit_retries: u32,
    /// Base delay between edit attempts, multiplied by the attempt number.
    pub edit_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_prefix: "http://localhost:8090".to_string(),
            edit_retries: 2,
            edit_backoff: Duration::from_millis(250),
        }
    }
}

/// A validated poll creation request, as produced by the command dispatcher.
#[derive(Debug, Clone)]
pub struct PollRequest {
    pub conversation_id: String,
    /// The chat message that carried the command.
    pub trigger_message_id: i64,
    pub prompt: String,
    pub options: Vec<String>,
    pub mode: PollMode,
}

#[derive(Debug, Clone)]
pub struct VoteReceipt {
    /// The stored vote, as written by the upsert.
    pub vote: Vote,
    /// Tally that was rendered into the results message.
    pub tally: Tally,
}

pub struct PollEngine {
    db: DbPool,
    transport: DynTransport,
    config: EngineConfig,
    poll_locks: DashMap<PollRef, Arc<Mutex<()>>>,
}

impl PollEngine {
    pub fn new(db: DbPool, transport: DynTransport, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
            poll_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn create_poll(&self, request: &PollRequest) -> Result<Poll, PollError> {
        tracing::debug!(
            conv_id = %request.conversation_id,
            trigger_msg_id = request.trigger_message_id,
            mode = request.mode.as_str(),
            "creating poll"
        );
        match request.mode {
            PollMode::Public => {
                self.create_public_poll(&request.conversation_id, &request.prompt, &request.options)
                    .await
            }
            PollMode::Anonymous => {
                self.create_anonymous_poll(
                    &request.conversation_id,
                    &request.prompt,
                    &request.options,
                )
                .await
            }
        }
    }

    /// Send the prompt with enumerated options and attach one reaction marker
    /// per option. Votes are the reactions themselves; only the poll row is
    /// stored.
    pub async fn create_public_poll(
        &self,
        conversation_id: &str,
        prompt: &str,
        options: &[String],
    ) -> Result<Poll, PollError> {
        validate_poll(prompt, options)?;

        let prompt_message_id = self
            .transport
            .send_message(conversation_id, &render::public_prompt(prompt, options))
            .await?;

        for option in 1..=options.len() {
            let Some(marker) = number_emoji(option) else {
                break;
            };
            if let Err(err) = self
                .transport
                .attach_reaction(conversation_id, prompt_message_id, marker)
                .await
            {
                tracing::warn!(
                    conv_id = %conversation_id,
                    prompt_msg_id = prompt_message_id,
                    option,
                    "failed to attach poll reaction: {err}"
                );
            }
        }

        let poll = Poll {
            poll_ref: PollRef::new(conversation_id, prompt_message_id),
            prompt: prompt.to_string(),
            options: options.to_vec(),
            results_message_id: prompt_message_id,
            mode: PollMode::Public,
            created_at: Utc::now(),
        };
        self.persist_poll(poll).await
    }

    /// Send the prompt, one vote link per option and an empty results
    /// message, then persist the poll. A failed send aborts before anything
    /// is stored, so no partially sent poll is ever votable.
    pub async fn create_anonymous_poll(
        &self,
        conversation_id: &str,
        prompt: &str,
        options: &[String],
    ) -> Result<Poll, PollError> {
        validate_poll(prompt, options)?;

        let prompt_message_id = self
            .transport
            .send_message(conversation_id, &render::anonymous_prompt(prompt))
            .await?;
        let poll_ref = PollRef::new(conversation_id, prompt_message_id);

        self.transport
            .send_message(
                conversation_id,
                &render::anonymous_choices(&poll_ref, options, &self.config.http_prefix),
            )
            .await?;

        let results_message_id = self
            .transport
            .send_message(conversation_id, render::RESULTS_PLACEHOLDER)
            .await?;

        let poll = Poll {
            poll_ref,
            prompt: prompt.to_string(),
            options: options.to_vec(),
            results_message_id,
            mode: PollMode::Anonymous,
            created_at: Utc::now(),
        };
        self.persist_poll(poll).await
    }

    async fn persist_poll(&self, poll: Poll) -> Result<Poll, PollError> {
        match polls::create_poll(&self.db, &poll).await {
            Ok(_) => {
                observability::poll_created();
                tracing::info!(
                    conv_id = %poll.poll_ref.conversation_id,
                    prompt_msg_id = poll.poll_ref.prompt_message_id,
                    results_msg_id = poll.results_message_id,
                    mode = poll.mode.as_str(),
                    options = poll.option_count(),
                    "poll created"
                );
                Ok(poll)
            }
            Err(err) => {
                // The messages are already visible in chat but cannot record
                // votes. Nothing retracts them automatically.
                tracing::error!(
                    conv_id = %poll.poll_ref.conversation_id,
                    prompt_msg_id = poll.poll_ref.prompt_message_id,
                    results_msg_id = poll.results_message_id,
                    "poll was sent but could not be persisted; requires administrative attention: {err}"
                );
                Err(PollError::PersistenceFailure(err))
            }
        }
    }

    /// Record `voter`'s choice from a vote token and refresh the results
    /// message. `voter` is the identity bound by the login flow, if any.
    ///
    /// On `TransportFailure` the vote is stored; only the visible tally lags
    /// until the next successful edit.
    pub async fn record_vote(
        &self,
        token: &str,
        voter: Option<&str>,
    ) -> Result<VoteReceipt, PollError> {
        let token = VoteToken::decode(token).map_err(|_| PollError::MalformedToken)?;

        let poll = self
            .find_anonymous_poll(&token.poll_ref)
            .await?
            .ok_or(PollError::PollNotFound)?;

        if !poll.accepts_choice(token.choice) {
            return Err(PollError::InvalidChoice {
                choice: token.choice,
                option_count: poll.option_count(),
            });
        }

        let voter = voter
            .filter(|voter| !voter.is_empty())
            .ok_or(PollError::Unauthenticated)?;

        let entry = self.poll_lock(&poll.poll_ref);
        let _guard = entry.lock().await;
        self.record_vote_locked(&poll, voter, token.choice).await
    }

    async fn record_vote_locked(
        &self,
        poll: &Poll,
        voter: &str,
        choice: u32,
    ) -> Result<VoteReceipt, PollError> {
        let vote = votes::upsert_vote(&self.db, &poll.poll_ref, voter, choice, Utc::now())
            .await?
            .into_vote()?;
        observability::vote_recorded();
        tracing::info!(
            conv_id = %poll.poll_ref.conversation_id,
            prompt_msg_id = poll.poll_ref.prompt_message_id,
            choice,
            "vote recorded"
        );
        let tally = self.publish_results(poll).await?;
        Ok(VoteReceipt { vote, tally })
    }

    /// Edit the results message from a fresh tally, retrying a bounded number
    /// of times. Every attempt re-reads the tally.
    async fn publish_results(&self, poll: &Poll) -> Result<Tally, PollError> {
        let mut attempt = 0u32;
        loop {
            let tally = votes::tally_votes(&self.db, &poll.poll_ref, poll.option_count()).await?;
            let text = render::results(&poll.options, &tally);
            match self
                .transport
                .edit_message(
                    &poll.poll_ref.conversation_id,
                    poll.results_message_id,
                    &text,
                )
                .await
            {
                Ok(()) => return Ok(tally),
                Err(err) if attempt < self.config.edit_retries => {
                    attempt += 1;
                    tracing::warn!(
                        conv_id = %poll.poll_ref.conversation_id,
                        results_msg_id = poll.results_message_id,
                        attempt,
                        "results edit failed, retrying: {err}"
                    );
                    tokio::time::sleep(self.config.edit_backoff * attempt).await;
                }
                Err(err) => {
                    observability::result_edit_failed();
                    tracing::error!(
                        conv_id = %poll.poll_ref.conversation_id,
                        results_msg_id = poll.results_message_id,
                        "results edit failed; vote kept, tally stale until next edit: {err}"
                    );
                    return Err(PollError::TransportFailure(err));
                }
            }
        }
    }

    /// Current tally of an anonymous poll, read from stored votes.
    pub async fn tally(&self, poll_ref: &PollRef) -> Result<Tally, PollError> {
        let poll = self
            .find_anonymous_poll(poll_ref)
            .await?
            .ok_or(PollError::PollNotFound)?;
        Ok(votes::tally_votes(&self.db, poll_ref, poll.option_count()).await?)
    }

    async fn find_anonymous_poll(&self, poll_ref: &PollRef) -> Result<Option<Poll>, PollError> {
        let Some(row) = polls::get_poll(&self.db, poll_ref).await? else {
            return Ok(None);
        };
        let poll = row.into_poll()?;
        Ok((poll.mode == PollMode::Anonymous).then_some(poll))
    }

    fn poll_lock(&self, poll_ref: &PollRef) -> PollLockEntry<'_> {
        let lock = self
            .poll_locks
            .entry(poll_ref.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PollLockEntry {
            locks: &self.poll_locks,
            poll_ref: poll_ref.clone(),
            lock,
        }
    }
}

/// A handle on one poll's mutex. Dropping it removes the map entry once no
/// other task holds or awaits the mutex, including when the owning future is
/// cancelled mid-vote.
struct PollLockEntry<'a> {
    locks: &'a DashMap<PollRef, Arc<Mutex<()>>>,
    poll_ref: PollRef,
    lock: Arc<Mutex<()>>,
}

impl PollLockEntry<'_> {
    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for PollLockEntry<'_> {
    fn drop(&mut self) {
        // Two references left means the map's and this handle's. New handles
        // are only cloned out of the map under the shard lock held here.
        self.locks
            .remove_if(&self.poll_ref, |_, lock| Arc::strong_count(lock) == 2);
    }
}

fn validate_poll(prompt: &str, options: &[String]) -> Result<(), PollError> {
    if prompt.trim().is_empty() {
        return Err(PollError::InvalidCommand("a poll needs a prompt".into()));
    }
    if options.is_empty() {
        return Err(PollError::InvalidCommand(
            "a poll needs at least one option".into(),
        ));
    }
    if options.len() > MAX_OPTIONS {
        return Err(PollError::InvalidCommand(format!(
            "a poll can have at most {MAX_OPTIONS} options"
        )));
    }
    Ok(())
}
