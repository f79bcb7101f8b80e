//! Registry of authenticated sessions and the routing operations over it.
//!
//! The map is the only state shared across session threads. Mutations and
//! snapshots are serialized by one mutex; no network write ever happens
//! while that mutex is held.

use std::{collections::HashMap, sync::Mutex};

use crate::{
    domain::{identity::UserId, presence::PresenceStatus},
    protocol::{codec, envelope::Envelope},
    server::session::SessionHandle,
};

const DELIVERY_FAILED: &str = "DELIVERY_FAILED";

#[derive(Debug, Default)]
pub struct Registry {
    clients: Mutex<HashMap<UserId, SessionHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the mapping for `user_id` (last connection
    /// wins) and broadcasts PRESENCE ONLINE to the other members. The
    /// superseded session, if any, is not force-closed.
    pub fn register(&self, user_id: UserId, handle: SessionHandle) {
        let count = {
            let Ok(mut clients) = self.clients.lock() else {
                return;
            };
            clients.insert(user_id, handle);
            clients.len()
        };
        tracing::info!(user_id, connected = count, "user registered");

        self.broadcast_presence(user_id, PresenceStatus::Online);
    }

    /// Removes the mapping and broadcasts PRESENCE OFFLINE, but only when
    /// `handle` still owns it. A superseded session tearing down after a
    /// relogin must not evict the replacement, so the removal is keyed on
    /// session identity, not just the user id.
    pub fn unregister(&self, user_id: UserId, handle: &SessionHandle) {
        let removed = {
            let Ok(mut clients) = self.clients.lock() else {
                return;
            };
            let owned = clients
                .get(&user_id)
                .is_some_and(|current| current.same_session(handle));
            if owned {
                clients.remove(&user_id);
            }
            (owned, clients.len())
        };

        if removed.0 {
            tracing::info!(user_id, connected = removed.1, "user unregistered");
            self.broadcast_presence(user_id, PresenceStatus::Offline);
        } else {
            tracing::debug!(user_id, "stale session teardown; registration kept");
        }
    }

    pub fn lookup(&self, user_id: UserId) -> Option<SessionHandle> {
        self.clients
            .lock()
            .ok()
            .and_then(|clients| clients.get(&user_id).cloned())
    }

    /// Attempts unicast delivery. Returns `false` when the user is offline
    /// or the write fails; the router never queues or retries.
    pub fn send_to_user(&self, user_id: UserId, line: &str) -> bool {
        let Some(handle) = self.lookup(user_id) else {
            tracing::debug!(user_id, "recipient not connected; line dropped");
            return false;
        };
        if !handle.is_running() {
            tracing::debug!(user_id, "recipient session stopped; line dropped");
            return false;
        }

        match handle.send_line(line) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    code = DELIVERY_FAILED,
                    user_id,
                    error = %error,
                    "unicast delivery failed"
                );
                false
            }
        }
    }

    /// Delivers `line` to every registered member. One failed delivery
    /// never aborts the rest. Returns the number of successful sends.
    pub fn broadcast_to_all(&self, line: &str) -> usize {
        self.broadcast(line, None)
    }

    /// Like `broadcast_to_all` but skips `excluded`.
    pub fn broadcast_except(&self, excluded: UserId, line: &str) -> usize {
        self.broadcast(line, Some(excluded))
    }

    pub fn broadcast_presence(&self, user_id: UserId, status: PresenceStatus) {
        let line = codec::encode(&Envelope::presence(user_id, status));
        let sent = self.broadcast_except(user_id, &line);
        tracing::debug!(user_id, status = %status, sent, "presence broadcast");
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.clients
            .lock()
            .map(|clients| clients.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    fn broadcast(&self, line: &str, excluded: Option<UserId>) -> usize {
        // Snapshot under the lock; every send happens outside it so a slow
        // recipient cannot stall registration or other deliveries.
        let snapshot: Vec<(UserId, SessionHandle)> = {
            let Ok(clients) = self.clients.lock() else {
                return 0;
            };
            clients
                .iter()
                .map(|(user_id, handle)| (*user_id, handle.clone()))
                .collect()
        };

        let mut sent = 0;
        for (user_id, handle) in snapshot {
            if Some(user_id) == excluded || !handle.is_running() {
                continue;
            }
            match handle.send_line(line) {
                Ok(()) => sent += 1,
                Err(error) => {
                    tracing::warn!(
                        code = DELIVERY_FAILED,
                        user_id,
                        error = %error,
                        "broadcast delivery failed; continuing"
                    );
                }
            }
        }
        sent
    }
}
