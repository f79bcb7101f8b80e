//! Client networking layer: connection, heartbeat, dispatcher, and the
//! use cases that drive them.

pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod heartbeat;
pub mod login;
pub mod send_message;

/// Returns the client module name for smoke checks.
pub fn module_name() -> &'static str {
    "client"
}
