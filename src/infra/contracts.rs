use anyhow::Result;

use crate::domain::{
    identity::{Identity, UserId},
    presence::PresenceStatus,
};

/// External user directory. Identity storage and credential validation live
/// behind this boundary; the relay core only reads identities and records
/// presence.
pub trait UserDirectory: Send + Sync {
    fn lookup_by_id(&self, user_id: UserId) -> Result<Option<Identity>>;
    fn lookup_by_handle(&self, handle: &str) -> Result<Option<Identity>>;
    fn set_presence(&self, user_id: UserId, status: PresenceStatus) -> Result<()>;
}

/// External message archive. Persistence failures are logged by callers and
/// never stop a message from being relayed.
pub trait MessageStore: Send + Sync {
    fn persist(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp_ms: i64,
    ) -> Result<()>;
}
