//! Relay server: listener, per-connection sessions, and the registry that
//! routes between them.

pub mod context;
pub mod listener;
pub mod registry;
pub mod session;

/// Returns the server module name for smoke checks.
pub fn module_name() -> &'static str {
    "server"
}
