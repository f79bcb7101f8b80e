//! Login/logout use case: resolve a handle through the user directory and
//! announce the identity to the relay server.

use crate::{
    client::connection::{LineSender, SendError},
    domain::identity::{Identity, UserId},
    infra::contracts::UserDirectory,
    protocol::{codec, envelope::Envelope},
};

#[derive(Debug)]
pub enum LoginError {
    /// The handle is not known to the user directory.
    UnknownHandle,
    /// The directory itself failed.
    Directory(anyhow::Error),
    Send(SendError),
}

impl std::fmt::Display for LoginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownHandle => f.write_str("unknown username or email"),
            Self::Directory(source) => write!(f, "user directory lookup failed: {source}"),
            Self::Send(source) => write!(f, "login send failed: {source}"),
        }
    }
}

impl std::error::Error for LoginError {}

/// Resolves `handle` and sends `AUTH LOGIN`. The server's ACK arrives
/// asynchronously through the dispatcher.
pub fn login(
    directory: &dyn UserDirectory,
    sender: &dyn LineSender,
    handle: &str,
) -> Result<Identity, LoginError> {
    let identity = directory
        .lookup_by_handle(handle)
        .map_err(LoginError::Directory)?
        .ok_or(LoginError::UnknownHandle)?;

    sender
        .send_line(&codec::encode(&Envelope::login(&identity)))
        .map_err(LoginError::Send)?;

    tracing::info!(user_id = identity.user_id, "login request sent");
    Ok(identity)
}

/// Sends `AUTH LOGOUT`; the caller disconnects afterwards.
pub fn logout(sender: &dyn LineSender, user_id: UserId) -> Result<(), SendError> {
    sender.send_line(&codec::encode(&Envelope::logout(user_id)))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{infra::stubs::InMemoryUserDirectory, protocol::envelope::AuthAction};

    #[derive(Default)]
    struct CapturingSender {
        lines: RefCell<Vec<String>>,
    }

    impl LineSender for CapturingSender {
        fn send_line(&self, line: &str) -> Result<(), SendError> {
            self.lines.borrow_mut().push(line.to_owned());
            Ok(())
        }
    }

    #[test]
    fn login_resolves_handle_and_sends_auth_login() {
        let directory = InMemoryUserDirectory::with_users([Identity::new(1, "alice")]);
        let sender = CapturingSender::default();

        let identity = login(&directory, &sender, "alice").expect("login must succeed");
        assert_eq!(identity, Identity::new(1, "alice"));

        let lines = sender.lines.borrow();
        assert_eq!(lines.len(), 1);
        match codec::decode(&lines[0]).expect("login line must decode") {
            Envelope::Auth {
                action,
                user_id,
                username,
                ..
            } => {
                assert_eq!(action, AuthAction::Login);
                assert_eq!(user_id, 1);
                assert_eq!(username.as_deref(), Some("alice"));
            }
            other => panic!("expected AUTH envelope, got {other:?}"),
        }
    }

    #[test]
    fn login_rejects_unknown_handle_without_sending() {
        let directory = InMemoryUserDirectory::new();
        let sender = CapturingSender::default();

        let error = login(&directory, &sender, "ghost").expect_err("unknown handle must fail");
        assert!(matches!(error, LoginError::UnknownHandle));
        assert!(sender.lines.borrow().is_empty());
    }

    #[test]
    fn logout_sends_auth_logout_without_username() {
        let sender = CapturingSender::default();

        logout(&sender, 9).expect("logout must send");

        let lines = sender.lines.borrow();
        match codec::decode(&lines[0]).expect("logout line must decode") {
            Envelope::Auth {
                action, username, ..
            } => {
                assert_eq!(action, AuthAction::Logout);
                assert_eq!(username, None);
            }
            other => panic!("expected AUTH envelope, got {other:?}"),
        }
    }
}
