use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static POLLS_CREATED: AtomicU64 = AtomicU64::new(0);
static VOTES_RECORDED: AtomicU64 = AtomicU64::new(0);
static RESULT_EDITS_FAILED: AtomicU64 = AtomicU64::new(0);
static LOGIN_TOKENS_ISSUED: AtomicU64 = AtomicU64::new(0);
static LOGINS_VERIFIED: AtomicU64 = AtomicU64::new(0);

pub fn poll_created() {
    POLLS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn vote_recorded() {
    VOTES_RECORDED.fetch_add(1, Ordering::Relaxed);
}

pub fn result_edit_failed() {
    RESULT_EDITS_FAILED.fetch_add(1, Ordering::Relaxed);
}

pub fn login_token_issued() {
    LOGIN_TOKENS_ISSUED.fetch_add(1, Ordering::Relaxed);
}

pub fn login_verified() {
    LOGINS_VERIFIED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PollMetricsSnapshot {
    pub polls_created: u64,
    pub votes_recorded: u64,
    pub result_edits_failed: u64,
    pub login_tokens_issued: u64,
    pub logins_verified: u64,
}

pub fn metrics_snapshot() -> PollMetricsSnapshot {
    PollMetricsSnapshot {
        polls_created: POLLS_CREATED.load(Ordering::Relaxed),
        votes_recorded: VOTES_RECORDED.load(Ordering::Relaxed),
        result_edits_failed: RESULT_EDITS_FAILED.load(Ordering::Relaxed),
        login_tokens_issued: LOGIN_TOKENS_ISSUED.load(Ordering::Relaxed),
        logins_verified: LOGINS_VERIFIED.load(Ordering::Relaxed),
    }
}
