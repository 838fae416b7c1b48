//! Chat transport seam: the three operations the poll subsystem needs from
//! the chat network.

pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Transport-assigned message identifier, unique within a conversation.
pub type MessageId = i64;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("chat bridge returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageId, TransportError>;

    /// Replace the content of a previously sent message.
    async fn edit_message(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), TransportError>;

    async fn attach_reaction(
        &self,
        conversation_id: &str,
        message_id: MessageId,
        marker: &str,
    ) -> Result<(), TransportError>;
}

pub type DynTransport = Arc<dyn ChatTransport>;
