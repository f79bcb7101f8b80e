use crate::domain::identity::UserId;

/// Online status carried by PRESENCE envelopes and heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Offline,
}

impl PresenceStatus {
    /// Wire spelling of the status, as it appears in the `status` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "ONLINE" => Some(Self::Online),
            "OFFLINE" => Some(Self::Offline),
            _ => None,
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One entry of a USER_LIST snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
    pub status: PresenceStatus,
}
