//! Wire protocol: one UTF-8 JSON envelope per newline-terminated line.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode};
pub use envelope::{AuthAction, DecodeError, Envelope};

/// Returns the protocol module name for smoke checks.
pub fn module_name() -> &'static str {
    "protocol"
}
