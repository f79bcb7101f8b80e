use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;

use crate::{
    domain::{
        identity::{Identity, UserId},
        presence::PresenceStatus,
    },
    infra::contracts::{MessageStore, UserDirectory},
};

/// In-memory user directory. Backs `wren serve` when no real directory is
/// wired in, and doubles as the test stand-in.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<UserId, Identity>>,
    presence: Mutex<HashMap<UserId, PresenceStatus>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = Identity>) -> Self {
        let directory = Self::default();
        if let Ok(mut known) = directory.users.lock() {
            for identity in users {
                known.insert(identity.user_id, identity);
            }
        }
        directory
    }

    /// Last presence recorded through `set_presence`, if any.
    pub fn presence_of(&self, user_id: UserId) -> Option<PresenceStatus> {
        self.presence
            .lock()
            .ok()
            .and_then(|presence| presence.get(&user_id).copied())
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn lookup_by_id(&self, user_id: UserId) -> Result<Option<Identity>> {
        Ok(self
            .users
            .lock()
            .ok()
            .and_then(|users| users.get(&user_id).cloned()))
    }

    fn lookup_by_handle(&self, handle: &str) -> Result<Option<Identity>> {
        Ok(self.users.lock().ok().and_then(|users| {
            users
                .values()
                .find(|identity| identity.username == handle)
                .cloned()
        }))
    }

    fn set_presence(&self, user_id: UserId, status: PresenceStatus) -> Result<()> {
        if let Ok(mut presence) = self.presence.lock() {
            presence.insert(user_id, status);
        }
        Ok(())
    }
}

/// A message persisted through the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub timestamp_ms: i64,
}

/// In-memory message store with the same purpose as the directory stub.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> Vec<StoredMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl MessageStore for InMemoryMessageStore {
    fn persist(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp_ms: i64,
    ) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(StoredMessage {
                sender_id,
                receiver_id,
                content: content.to_owned(),
                timestamp_ms,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resolves_by_id_and_handle() {
        let directory =
            InMemoryUserDirectory::with_users([Identity::new(1, "alice"), Identity::new(2, "bob")]);

        let by_id = directory
            .lookup_by_id(2)
            .expect("lookup must not fail")
            .expect("bob must be known");
        assert_eq!(by_id.username, "bob");

        let by_handle = directory
            .lookup_by_handle("alice")
            .expect("lookup must not fail")
            .expect("alice must be known");
        assert_eq!(by_handle.user_id, 1);

        assert!(directory
            .lookup_by_handle("nobody")
            .expect("lookup must not fail")
            .is_none());
    }

    #[test]
    fn directory_records_last_presence() {
        let directory = InMemoryUserDirectory::new();
        assert_eq!(directory.presence_of(1), None);

        directory
            .set_presence(1, PresenceStatus::Online)
            .expect("set_presence must not fail");
        directory
            .set_presence(1, PresenceStatus::Offline)
            .expect("set_presence must not fail");
        assert_eq!(directory.presence_of(1), Some(PresenceStatus::Offline));
    }

    #[test]
    fn store_keeps_messages_in_arrival_order() {
        let store = InMemoryMessageStore::new();
        store
            .persist(1, 2, "first", 10)
            .expect("persist must not fail");
        store
            .persist(2, 1, "second", 20)
            .expect("persist must not fail");

        let stored = store.stored();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].content, "first");
        assert_eq!(stored[1].receiver_id, 1);
    }
}
