use thiserror::Error;

use crate::domain::{
    identity::{Identity, UserId},
    presence::{OnlineUser, PresenceStatus},
};

/// Action carried by an AUTH envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    Logout,
}

impl AuthAction {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Logout => "LOGOUT",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "LOGIN" => Some(Self::Login),
            "LOGOUT" => Some(Self::Logout),
            _ => None,
        }
    }
}

/// One self-describing line exchanged over the wire, tagged by `type`.
///
/// Every variant carries the producer-assigned `timestamp` in epoch
/// milliseconds. LOGIN carries a username; LOGOUT does not.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Auth {
        action: AuthAction,
        user_id: UserId,
        username: Option<String>,
        timestamp_ms: i64,
    },
    Message {
        sender_id: UserId,
        receiver_id: UserId,
        content: String,
        timestamp_ms: i64,
    },
    Presence {
        user_id: UserId,
        status: PresenceStatus,
        timestamp_ms: i64,
    },
    Typing {
        sender_id: UserId,
        receiver_id: UserId,
        is_typing: bool,
        timestamp_ms: i64,
    },
    Ack {
        message_id: String,
        success: bool,
        timestamp_ms: i64,
    },
    UserList {
        users: Vec<OnlineUser>,
        timestamp_ms: i64,
    },
    Error {
        message: String,
        timestamp_ms: i64,
    },
}

impl Envelope {
    pub fn login(identity: &Identity) -> Self {
        Self::Auth {
            action: AuthAction::Login,
            user_id: identity.user_id,
            username: Some(identity.username.clone()),
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn logout(user_id: UserId) -> Self {
        Self::Auth {
            action: AuthAction::Logout,
            user_id,
            username: None,
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn chat(sender_id: UserId, receiver_id: UserId, content: impl Into<String>) -> Self {
        Self::Message {
            sender_id,
            receiver_id,
            content: content.into(),
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn presence(user_id: UserId, status: PresenceStatus) -> Self {
        Self::Presence {
            user_id,
            status,
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn typing(sender_id: UserId, receiver_id: UserId, is_typing: bool) -> Self {
        Self::Typing {
            sender_id,
            receiver_id,
            is_typing,
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn ack(message_id: impl Into<String>, success: bool) -> Self {
        Self::Ack {
            message_id: message_id.into(),
            success,
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn user_list(users: Vec<OnlineUser>) -> Self {
        Self::UserList {
            users,
            timestamp_ms: now_unix_ms(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            timestamp_ms: now_unix_ms(),
        }
    }

    /// Wire spelling of the envelope kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "AUTH",
            Self::Message { .. } => "MESSAGE",
            Self::Presence { .. } => "PRESENCE",
            Self::Typing { .. } => "TYPING",
            Self::Ack { .. } => "ACK",
            Self::UserList { .. } => "USER_LIST",
            Self::Error { .. } => "ERROR",
        }
    }
}

/// Current time in epoch milliseconds, as stamped on produced envelopes.
pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Why an inbound line could not be decoded. Never fatal: the line is
/// logged and dropped by every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("line is not a JSON object")]
    Malformed,
    #[error("envelope has no type field")]
    NoType,
    #[error("unknown envelope type: {0}")]
    UnknownType(String),
    #[error("missing or mistyped field: {0}")]
    MissingField(&'static str),
}
