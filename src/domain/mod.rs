//! Domain layer: identities, messages, presence, and notification types.

pub mod identity;
pub mod message;
pub mod notification;
pub mod presence;

/// Returns the domain module name for smoke checks.
pub fn module_name() -> &'static str {
    "domain"
}
