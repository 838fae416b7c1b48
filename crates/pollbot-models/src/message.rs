use serde::{Deserialize, Serialize};

/// A chat message relayed to the bot by the chat bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub conversation_id: String,
    pub message_id: i64,
    /// Username of the sender, as authenticated by the chat transport.
    pub sender: String,
    /// True when the conversation contains only the sender and the bot.
    #[serde(default)]
    pub direct: bool,
    pub text: String,
}

/// Event pushed by the chat bridge to the bot's webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Message(IncomingMessage),
    /// The bot was added to a conversation.
    ConversationJoined { conversation_id: String },
}
