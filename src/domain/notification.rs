use crate::domain::{
    identity::UserId,
    message::ChatMessage,
    presence::{OnlineUser, PresenceStatus},
};

/// Typed notifications raised by the client dispatcher.
///
/// The closed set replaces per-event callback setters: a consumer matches
/// exhaustively instead of registering one callback per envelope kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NewMessage(ChatMessage),
    StatusChanged {
        user_id: UserId,
        status: PresenceStatus,
    },
    TypingChanged {
        sender_id: UserId,
        is_typing: bool,
    },
    UserListUpdated(Vec<OnlineUser>),
    AckReceived {
        message_id: String,
        success: bool,
    },
    ServerError(String),
}

/// Receives dispatcher notifications.
///
/// The dispatcher has no UI-thread affinity; an implementation decides
/// whether delivery must be marshalled onto a particular execution context.
/// It must not block the consuming loop indefinitely.
pub trait NotificationSink {
    fn deliver(&self, notification: Notification);
}
