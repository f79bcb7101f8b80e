//! Outbound message use case: validate, persist, then relay.

use crate::{
    client::connection::{LineSender, SendError},
    domain::identity::UserId,
    infra::contracts::MessageStore,
    protocol::{codec, envelope::{now_unix_ms, Envelope}},
};

const OUTBOUND_PERSIST_FAILED: &str = "OUTBOUND_PERSIST_FAILED";

/// Command to send one direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

#[derive(Debug)]
pub enum SendMessageError {
    /// Content is empty after trimming whitespace.
    EmptyContent,
    /// Content contains a line break, which would corrupt wire framing.
    ContainsLineBreak,
    Send(SendError),
}

impl std::fmt::Display for SendMessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => f.write_str("message content is empty"),
            Self::ContainsLineBreak => f.write_str("message content contains a line break"),
            Self::Send(source) => write!(f, "message send failed: {source}"),
        }
    }
}

impl std::error::Error for SendMessageError {}

/// Persists the message through the archive collaborator and relays it.
/// Delivery is attempted regardless of the persistence outcome.
pub fn send_chat_message(
    store: &dyn MessageStore,
    sender: &dyn LineSender,
    command: SendCommand,
) -> Result<(), SendMessageError> {
    let content = command.content.trim();
    if content.is_empty() {
        return Err(SendMessageError::EmptyContent);
    }
    if content.contains(['\n', '\r']) {
        return Err(SendMessageError::ContainsLineBreak);
    }

    let timestamp_ms = now_unix_ms();
    if let Err(error) = store.persist(command.sender_id, command.receiver_id, content, timestamp_ms)
    {
        tracing::warn!(
            code = OUTBOUND_PERSIST_FAILED,
            receiver_id = command.receiver_id,
            error = ?error,
            "failed to persist outbound message; relaying anyway"
        );
    }

    let envelope = Envelope::Message {
        sender_id: command.sender_id,
        receiver_id: command.receiver_id,
        content: content.to_owned(),
        timestamp_ms,
    };
    sender
        .send_line(&codec::encode(&envelope))
        .map_err(SendMessageError::Send)
}
