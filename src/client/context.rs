//! Client-side context: the active connection plus the authenticated
//! identity and collaborator handles. Replaces any notion of a process-wide
//! "current user" singleton.

use std::{
    sync::{mpsc::Sender, Arc},
    time::Duration,
};

use crate::{
    client::{
        connection::{ConnectError, Connection, ConnectionEvent, SendError},
        heartbeat::Heartbeat,
        login::{self, LoginError},
        send_message::{self, SendCommand, SendMessageError},
    },
    domain::identity::{Identity, UserId},
    infra::{
        config::NetworkConfig,
        contracts::{MessageStore, UserDirectory},
    },
    protocol::{codec, envelope::Envelope},
};

#[derive(Debug)]
pub enum EstablishError {
    Connect(ConnectError),
    Login(LoginError),
}

impl std::fmt::Display for EstablishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(source) => write!(f, "connect failed: {source}"),
            Self::Login(source) => write!(f, "login failed: {source}"),
        }
    }
}

impl std::error::Error for EstablishError {}

pub struct ClientContext {
    pub connection: Arc<Connection>,
    pub identity: Identity,
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn MessageStore>,
}

impl ClientContext {
    /// Connects to the relay and authenticates `handle` in one step.
    /// On login failure the half-open connection is torn down again.
    pub fn establish(
        network: &NetworkConfig,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn MessageStore>,
        handle: &str,
        event_tx: Sender<ConnectionEvent>,
    ) -> Result<Self, EstablishError> {
        let connection = Arc::new(
            Connection::connect(
                network.host.clone(),
                network.port,
                Duration::from_millis(network.connect_timeout_ms),
                Duration::from_millis(network.reconnect_backoff_ms),
                event_tx,
            )
            .map_err(EstablishError::Connect)?,
        );

        let identity = match login::login(directory.as_ref(), connection.as_ref(), handle) {
            Ok(identity) => identity,
            Err(error) => {
                connection.disconnect();
                return Err(EstablishError::Login(error));
            }
        };

        Ok(Self {
            connection,
            identity,
            directory,
            store,
        })
    }

    pub fn send_message(
        &self,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Result<(), SendMessageError> {
        send_message::send_chat_message(
            self.store.as_ref(),
            self.connection.as_ref(),
            SendCommand {
                sender_id: self.identity.user_id,
                receiver_id,
                content: content.into(),
            },
        )
    }

    pub fn send_typing(&self, receiver_id: UserId, is_typing: bool) -> Result<(), SendError> {
        self.connection.send(&codec::encode(&Envelope::typing(
            self.identity.user_id,
            receiver_id,
            is_typing,
        )))
    }

    /// Builds the heartbeat for this identity; the caller starts and stops it.
    pub fn heartbeat(&self, interval: Duration) -> Heartbeat {
        Heartbeat::new(
            self.connection.clone(),
            self.directory.clone(),
            self.identity.user_id,
            interval,
        )
    }

    /// Announces LOGOUT and closes the connection.
    pub fn logout(&self) {
        if let Err(error) = login::logout(self.connection.as_ref(), self.identity.user_id) {
            tracing::warn!(error = %error, "logout announcement failed; disconnecting anyway");
        }
        self.connection.disconnect();
    }
}
