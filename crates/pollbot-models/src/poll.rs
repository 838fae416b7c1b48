use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a poll: the conversation plus the prompt message in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollRef {
    pub conversation_id: String,
    pub prompt_message_id: i64,
}

impl PollRef {
    pub fn new(conversation_id: impl Into<String>, prompt_message_id: i64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            prompt_message_id,
        }
    }
}

impl fmt::Display for PollRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.conversation_id, self.prompt_message_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// Votes are chat reactions on the prompt message.
    Public,
    /// Votes arrive through vote links and are stored per voter.
    Anonymous,
}

impl PollMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PollMode::Public => "public",
            PollMode::Anonymous => "anonymous",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "public" => Some(PollMode::Public),
            "anonymous" => Some(PollMode::Anonymous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub poll_ref: PollRef,
    pub prompt: String,
    /// Option labels in display order; choice `n` refers to `options[n - 1]`.
    pub options: Vec<String>,
    pub results_message_id: i64,
    pub mode: PollMode,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    /// Choices are 1-indexed and bounded by the option count.
    pub fn accepts_choice(&self, choice: u32) -> bool {
        choice >= 1 && (choice as usize) <= self.option_count()
    }
}

/// A single voter's current choice in an anonymous poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub poll_ref: PollRef,
    pub voter: String,
    pub choice: u32,
    pub updated_at: DateTime<Utc>,
}

/// Per-option vote counts, index `i` holding the count for choice `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    counts: Vec<u64>,
}

impl Tally {
    pub fn empty(option_count: usize) -> Self {
        Self {
            counts: vec![0; option_count],
        }
    }

    /// Build a tally from stored choices. Choices outside `1..=option_count`
    /// are ignored.
    pub fn from_choices(option_count: usize, choices: impl IntoIterator<Item = u32>) -> Self {
        let mut tally = Self::empty(option_count);
        for choice in choices {
            tally.record(choice);
        }
        tally
    }

    pub fn record(&mut self, choice: u32) -> bool {
        self.add(choice, 1)
    }

    /// Add `votes` to a choice; returns false if the choice is out of range.
    pub fn add(&mut self, choice: u32, votes: u64) -> bool {
        let Some(index) = (choice as usize).checked_sub(1) else {
            return false;
        };
        match self.counts.get_mut(index) {
            Some(count) => {
                *count += votes;
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn count_for(&self, choice: u32) -> u64 {
        (choice as usize)
            .checked_sub(1)
            .and_then(|i| self.counts.get(i))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_ignores_out_of_range_choices() {
        let tally = Tally::from_choices(2, [1, 2, 2, 0, 3]);
        assert_eq!(tally.counts(), &[1, 2]);
        assert_eq!(tally.total(), 3);
        assert_eq!(tally.count_for(2), 2);
        assert_eq!(tally.count_for(0), 0);
        assert_eq!(tally.count_for(9), 0);
    }

    #[test]
    fn poll_mode_round_trips_through_strings() {
        for mode in [PollMode::Public, PollMode::Anonymous] {
            assert_eq!(PollMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(PollMode::parse("secret"), None);
    }

    #[test]
    fn incoming_message_direct_defaults_to_false() {
        let msg: crate::IncomingMessage = serde_json::from_str(
            r#"{"conversation_id":"c1","message_id":4,"sender":"alice","text":"login"}"#,
        )
        .expect("parse");
        assert!(!msg.direct);
        assert_eq!(msg.sender, "alice");
    }
}
