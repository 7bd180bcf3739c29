//! Shared-password session gate.
//!
//! This is a convenience lock in front of the tracker, not access control:
//! the digest ships with the configuration and the session flag is a plain
//! value in session-scoped storage.

mod session_gate;

pub use session_gate::{
    password_digest, FileSessionStorage, MemorySessionStorage, SessionGate, SessionStorage,
    SESSION_KEY,
};
