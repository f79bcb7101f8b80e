//! One session per accepted TCP connection: a small protocol state machine
//! driving the registry.

use std::{
    io::{self, BufRead, BufReader, Write},
    net::{Shutdown, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    domain::{
        identity::{Identity, UserId},
        presence::{OnlineUser, PresenceStatus},
    },
    protocol::{
        codec,
        envelope::{AuthAction, DecodeError, Envelope},
    },
    server::context::ServerContext,
};

const SESSION_SEND_FAILED: &str = "SESSION_SEND_FAILED";
const SESSION_READ_FAILED: &str = "SESSION_READ_FAILED";
const MESSAGE_PERSIST_FAILED: &str = "MESSAGE_PERSIST_FAILED";
const USER_LOOKUP_FAILED: &str = "USER_LOOKUP_FAILED";

/// The shareable half of a session: a serialized writer plus a liveness
/// flag. This is what the registry hands out for routing.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    writer: Arc<Mutex<TcpStream>>,
    running: Arc<AtomicBool>,
}

impl SessionHandle {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self {
            writer: Arc::new(Mutex::new(stream)),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// True when both handles belong to the same accepted connection.
    /// Distinguishes a live registration from a superseded one for the
    /// same user id.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.running, &other.running)
    }

    pub(crate) fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_socket(&self) {
        if let Ok(writer) = self.writer.lock() {
            let _ = writer.shutdown(Shutdown::Both);
        }
    }

    /// Writes one line to this session's client. The writer mutex is the
    /// only lock held during the write, so a slow peer stalls nobody else.
    pub fn send_line(&self, line: &str) -> io::Result<()> {
        if !self.is_running() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session stopped",
            ));
        }
        let Ok(mut writer) = self.writer.lock() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "session writer poisoned",
            ));
        };
        let framed = format!("{line}\n");
        writer.write_all(framed.as_bytes())
    }

    pub fn send_envelope(&self, envelope: &Envelope) -> io::Result<()> {
        self.send_line(&codec::encode(envelope))
    }
}

/// Session lifecycle. Every teardown path converges on `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticated,
    Closed,
}

pub struct Session {
    context: Arc<ServerContext>,
    handle: SessionHandle,
    reader: Option<TcpStream>,
    peer: String,
    identity: Option<Identity>,
    state: SessionState,
}

impl Session {
    pub fn new(stream: TcpStream, context: Arc<ServerContext>) -> io::Result<Self> {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_owned());
        let reader = stream.try_clone()?;

        Ok(Self {
            context,
            handle: SessionHandle::new(stream),
            reader: Some(reader),
            peer,
            identity: None,
            state: SessionState::Connecting,
        })
    }

    /// Receive loop: runs until LOGOUT, EOF, or a read error, then tears
    /// the session down exactly once.
    pub fn run(mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        tracing::info!(peer = %self.peer, "session started");

        loop {
            if self.state == SessionState::Closed {
                break;
            }
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']);
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.handle_line(trimmed);
                }
                Err(error) => {
                    if self.state != SessionState::Closed {
                        tracing::debug!(
                            code = SESSION_READ_FAILED,
                            peer = %self.peer,
                            error = %error,
                            "session read failed; treating as disconnect"
                        );
                    }
                    break;
                }
            }
        }

        self.close();
    }

    fn handle_line(&mut self, line: &str) {
        match codec::decode(line) {
            Ok(envelope) => self.handle_envelope(line, envelope),
            Err(DecodeError::Malformed) => self.send_error("invalid message format"),
            Err(DecodeError::NoType) => self.send_error("message type missing"),
            Err(DecodeError::MissingField(field)) => {
                self.send_error(&format!("missing field: {field}"));
            }
            Err(DecodeError::UnknownType(kind)) => {
                tracing::warn!(peer = %self.peer, envelope_type = %kind, "unknown envelope type dropped");
            }
        }
    }

    fn handle_envelope(&mut self, raw: &str, envelope: Envelope) {
        match envelope {
            Envelope::Auth {
                action: AuthAction::Login,
                user_id,
                username: Some(username),
                ..
            } => self.on_login(user_id, username),
            Envelope::Auth {
                action: AuthAction::Login,
                ..
            } => self.send_error("authentication failed"),
            Envelope::Auth {
                action: AuthAction::Logout,
                user_id,
                ..
            } => {
                tracing::info!(peer = %self.peer, user_id, "user logging out");
                self.close();
            }
            Envelope::Message {
                sender_id,
                receiver_id,
                content,
                timestamp_ms,
            } => self.on_message(raw, sender_id, receiver_id, &content, timestamp_ms),
            Envelope::Presence {
                user_id, status, ..
            } => {
                self.context.registry.broadcast_presence(user_id, status);
            }
            Envelope::Typing { receiver_id, .. } => {
                // Forwarded verbatim, no acknowledgment.
                self.context.registry.send_to_user(receiver_id, raw);
            }
            Envelope::Ack { .. } | Envelope::UserList { .. } | Envelope::Error { .. } => {
                tracing::warn!(
                    peer = %self.peer,
                    envelope_type = envelope.kind(),
                    "client-bound envelope received from client; dropped"
                );
            }
        }
    }

    fn on_login(&mut self, user_id: UserId, username: String) {
        tracing::info!(peer = %self.peer, user_id, username = %username, "user authenticated");

        self.identity = Some(Identity::new(user_id, username));
        self.state = SessionState::Authenticated;

        // Replaces any prior session for this id (last connection wins) and
        // broadcasts PRESENCE ONLINE to everyone else.
        self.context.registry.register(user_id, self.handle.clone());

        self.send_envelope(&Envelope::ack("AUTH", true));
        self.send_user_list(user_id);
    }

    /// Sends the freshly authenticated client a snapshot of who is online.
    fn send_user_list(&self, user_id: UserId) {
        let mut users = Vec::new();
        for online_id in self.context.registry.online_users() {
            if online_id == user_id {
                continue;
            }
            match self.context.directory.lookup_by_id(online_id) {
                Ok(Some(identity)) => users.push(OnlineUser {
                    user_id: online_id,
                    username: identity.username,
                    status: PresenceStatus::Online,
                }),
                Ok(None) => {
                    tracing::debug!(user_id = online_id, "online user missing from directory");
                }
                Err(error) => {
                    tracing::warn!(
                        code = USER_LOOKUP_FAILED,
                        user_id = online_id,
                        error = ?error,
                        "user directory lookup failed"
                    );
                }
            }
        }
        self.send_envelope(&Envelope::user_list(users));
    }

    fn on_message(
        &mut self,
        raw: &str,
        sender_id: UserId,
        receiver_id: UserId,
        content: &str,
        timestamp_ms: i64,
    ) {
        if let Err(error) = self
            .context
            .store
            .persist(sender_id, receiver_id, content, timestamp_ms)
        {
            tracing::warn!(
                code = MESSAGE_PERSIST_FAILED,
                sender_id,
                receiver_id,
                error = ?error,
                "message persistence failed; relaying anyway"
            );
        }

        let delivered = self.context.registry.send_to_user(receiver_id, raw);
        tracing::debug!(sender_id, receiver_id, delivered, "message routed");

        // Best-effort relay: the ACK confirms receipt by the server, not
        // delivery to the recipient.
        self.send_envelope(&Envelope::ack("MESSAGE", true));
    }

    fn send_envelope(&self, envelope: &Envelope) {
        if let Err(error) = self.handle.send_envelope(envelope) {
            tracing::warn!(
                code = SESSION_SEND_FAILED,
                peer = %self.peer,
                envelope_type = envelope.kind(),
                error = %error,
                "send to client failed"
            );
        }
    }

    fn send_error(&self, message: &str) {
        self.send_envelope(&Envelope::error(message));
    }

    /// Single teardown routine shared by LOGOUT, EOF, and read errors.
    fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.handle.mark_stopped();

        // Unregistering broadcasts PRESENCE OFFLINE iff an identity was
        // ever bound and this session still owns the registration.
        if let Some(identity) = self.identity.take() {
            self.context
                .registry
                .unregister(identity.user_id, &self.handle);
        }

        self.handle.shutdown_socket();
        tracing::info!(peer = %self.peer, "session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tcp_pair, LineReader};

    #[test]
    fn handle_writes_framed_lines() {
        let (client, server) = tcp_pair();
        let handle = SessionHandle::new(server);

        handle.send_line("first").expect("send must succeed");
        handle
            .send_envelope(&Envelope::ack("AUTH", true))
            .expect("send must succeed");

        let mut client = LineReader::new(client);
        assert_eq!(client.next_line().as_deref(), Some("first"));
        let ack = client.next_line().expect("ack line");
        assert!(matches!(
            codec::decode(&ack),
            Ok(Envelope::Ack { success: true, .. })
        ));
    }

    #[test]
    fn stopped_handle_refuses_to_send() {
        let (_client, server) = tcp_pair();
        let handle = SessionHandle::new(server);

        handle.mark_stopped();

        assert!(!handle.is_running());
        assert!(handle.send_line("late").is_err());
    }
}
