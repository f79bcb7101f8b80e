//! Demultiplexes inbound envelopes into typed notifications for the
//! consuming UI layer.

use std::sync::{mpsc::Receiver, Arc};

use crate::{
    client::connection::ConnectionEvent,
    domain::{
        message::ChatMessage,
        notification::{Notification, NotificationSink},
    },
    infra::contracts::MessageStore,
    protocol::{codec, envelope::DecodeError, Envelope},
};

const DISPATCH_DECODE_FAILED: &str = "DISPATCH_DECODE_FAILED";
const INBOUND_PERSIST_FAILED: &str = "INBOUND_PERSIST_FAILED";

/// Decodes server pushes and hands each one to the caller-supplied sink.
/// Decode failures are logged and dropped; nothing here is fatal.
pub struct Dispatcher<S: NotificationSink> {
    sink: S,
    store: Arc<dyn MessageStore>,
}

impl<S: NotificationSink> Dispatcher<S> {
    pub fn new(sink: S, store: Arc<dyn MessageStore>) -> Self {
        Self { sink, store }
    }

    /// Consumes connection events until the channel ends or the connection
    /// reports `Closed`.
    pub fn run(&self, events: Receiver<ConnectionEvent>) {
        for event in events {
            match event {
                ConnectionEvent::Line(line) => self.handle(&line),
                ConnectionEvent::Closed => {
                    tracing::info!("server connection closed");
                    break;
                }
            }
        }
    }

    pub fn handle(&self, line: &str) {
        match codec::decode(line) {
            Ok(envelope) => self.dispatch(envelope),
            Err(DecodeError::UnknownType(kind)) => {
                // Forward-compatible no-op.
                tracing::debug!(envelope_type = %kind, "unknown envelope type ignored");
            }
            Err(error) => {
                tracing::warn!(
                    code = DISPATCH_DECODE_FAILED,
                    error = %error,
                    "inbound line dropped"
                );
            }
        }
    }

    fn dispatch(&self, envelope: Envelope) {
        match envelope {
            Envelope::Message {
                sender_id,
                receiver_id,
                content,
                timestamp_ms,
            } => {
                if let Err(error) =
                    self.store
                        .persist(sender_id, receiver_id, &content, timestamp_ms)
                {
                    tracing::warn!(
                        code = INBOUND_PERSIST_FAILED,
                        sender_id,
                        error = ?error,
                        "failed to persist inbound message; notifying anyway"
                    );
                }
                self.sink.deliver(Notification::NewMessage(ChatMessage {
                    sender_id,
                    receiver_id,
                    content,
                    timestamp_ms,
                }));
            }
            Envelope::Presence {
                user_id, status, ..
            } => {
                self.sink
                    .deliver(Notification::StatusChanged { user_id, status });
            }
            Envelope::Typing {
                sender_id,
                is_typing,
                ..
            } => {
                self.sink.deliver(Notification::TypingChanged {
                    sender_id,
                    is_typing,
                });
            }
            Envelope::UserList { users, .. } => {
                self.sink.deliver(Notification::UserListUpdated(users));
            }
            Envelope::Ack {
                message_id,
                success,
                ..
            } => {
                self.sink.deliver(Notification::AckReceived {
                    message_id,
                    success,
                });
            }
            Envelope::Error { message, .. } => {
                self.sink.deliver(Notification::ServerError(message));
            }
            Envelope::Auth { .. } => {
                tracing::warn!("auth envelope is client-to-server only; dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        domain::presence::PresenceStatus,
        infra::stubs::InMemoryMessageStore,
    };

    #[derive(Default)]
    struct RecordingSink {
        seen: RefCell<Vec<Notification>>,
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, notification: Notification) {
            self.seen.borrow_mut().push(notification);
        }
    }

    struct FailingStore;

    impl MessageStore for FailingStore {
        fn persist(&self, _: i64, _: i64, _: &str, _: i64) -> anyhow::Result<()> {
            anyhow::bail!("archive unavailable")
        }
    }

    fn dispatcher() -> (Dispatcher<RecordingSink>, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        (
            Dispatcher::new(RecordingSink::default(), store.clone()),
            store,
        )
    }

    #[test]
    fn message_envelope_becomes_new_message_and_is_persisted() {
        let (dispatcher, store) = dispatcher();

        dispatcher.handle(&codec::encode(&Envelope::chat(1, 2, "hi")));

        let seen = dispatcher.sink.seen.borrow();
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Notification::NewMessage(message) => {
                assert_eq!(message.sender_id, 1);
                assert_eq!(message.content, "hi");
            }
            other => panic!("expected NewMessage, got {other:?}"),
        }
        assert_eq!(store.stored().len(), 1);
        assert_eq!(store.stored()[0].content, "hi");
    }

    #[test]
    fn persistence_failure_still_notifies() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), Arc::new(FailingStore));

        dispatcher.handle(&codec::encode(&Envelope::chat(1, 2, "hi")));

        assert_eq!(dispatcher.sink.seen.borrow().len(), 1);
    }

    #[test]
    fn routes_each_push_kind_to_its_notification() {
        let (dispatcher, _store) = dispatcher();

        dispatcher.handle(&codec::encode(&Envelope::presence(7, PresenceStatus::Offline)));
        dispatcher.handle(&codec::encode(&Envelope::typing(7, 1, true)));
        dispatcher.handle(&codec::encode(&Envelope::user_list(Vec::new())));
        dispatcher.handle(&codec::encode(&Envelope::ack("AUTH", true)));
        dispatcher.handle(&codec::encode(&Envelope::error("boom")));

        let seen = dispatcher.sink.seen.borrow();
        assert_eq!(
            *seen,
            vec![
                Notification::StatusChanged {
                    user_id: 7,
                    status: PresenceStatus::Offline,
                },
                Notification::TypingChanged {
                    sender_id: 7,
                    is_typing: true,
                },
                Notification::UserListUpdated(Vec::new()),
                Notification::AckReceived {
                    message_id: "AUTH".to_owned(),
                    success: true,
                },
                Notification::ServerError("boom".to_owned()),
            ]
        );
    }

    #[test]
    fn undecodable_and_unknown_lines_are_dropped() {
        let (dispatcher, store) = dispatcher();

        dispatcher.handle("");
        dispatcher.handle("not json");
        dispatcher.handle(r#"{"userId": 1}"#);
        dispatcher.handle(r#"{"type": "HANDSHAKE", "timestamp": 0}"#);

        assert!(dispatcher.sink.seen.borrow().is_empty());
        assert!(store.stored().is_empty());
    }
}
