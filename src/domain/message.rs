use crate::domain::identity::UserId;

/// A direct message between two users, as surfaced to the consuming UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    /// Producer-assigned send time, epoch milliseconds.
    pub timestamp_ms: i64,
}
