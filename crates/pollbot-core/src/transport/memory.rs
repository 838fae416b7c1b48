//! In-process transport that keeps every message in memory, with
//! switchable failure injection.

use super::{ChatTransport, MessageId, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub conversation_id: String,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: MessageId,
    sent: Vec<SentMessage>,
    current: HashMap<(String, MessageId), String>,
    edits: Vec<SentMessage>,
    reactions: Vec<(String, MessageId, String)>,
    /// Sends allowed before every further send fails.
    sends_before_failure: Option<usize>,
    failing_edits: usize,
    fail_reactions: bool,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Let `count` more sends succeed, then fail the rest.
    pub fn fail_sends_after(&self, count: usize) {
        self.lock().sends_before_failure = Some(count);
    }

    /// Fail the next `count` edits.
    pub fn fail_next_edits(&self, count: usize) {
        self.lock().failing_edits = count;
    }

    pub fn fail_reactions(&self, fail: bool) {
        self.lock().fail_reactions = fail;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.lock().sent.clone()
    }

    pub fn edits(&self) -> Vec<SentMessage> {
        self.lock().edits.clone()
    }

    pub fn reactions(&self) -> Vec<(String, MessageId, String)> {
        self.lock().reactions.clone()
    }

    /// Current text of a message, after any edits.
    pub fn message_text(&self, conversation_id: &str, message_id: MessageId) -> Option<String> {
        self.lock()
            .current
            .get(&(conversation_id.to_string(), message_id))
            .cloned()
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageId, TransportError> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.sends_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(TransportError::Request("send failure injected".into()));
            }
            *remaining -= 1;
        }
        inner.next_id += 1;
        let message_id = inner.next_id;
        inner.sent.push(SentMessage {
            conversation_id: conversation_id.to_string(),
            message_id,
            text: text.to_string(),
        });
        inner
            .current
            .insert((conversation_id.to_string(), message_id), text.to_string());
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.failing_edits > 0 {
            inner.failing_edits -= 1;
            return Err(TransportError::Status {
                status: 503,
                body: "edit failure injected".into(),
            });
        }
        let key = (conversation_id.to_string(), message_id);
        let Some(current) = inner.current.get_mut(&key) else {
            return Err(TransportError::Status {
                status: 404,
                body: "no such message".into(),
            });
        };
        *current = text.to_string();
        inner.edits.push(SentMessage {
            conversation_id: conversation_id.to_string(),
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn attach_reaction(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        marker: &str,
    ) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if inner.fail_reactions {
            return Err(TransportError::Request("reaction failure injected".into()));
        }
        inner
            .reactions
            .push((conversation_id.to_string(), message_id, marker.to_string()));
        Ok(())
    }
}
