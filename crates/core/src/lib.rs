//! Shared domain types for the campus realtime client.
//!
//! Pure, side-effect-free building blocks used by the connection manager:
//! credential expiry decoding, connection-error classification, the error
//! taxonomy, and the realtime event vocabulary.

pub mod classify;
pub mod credential;
pub mod error;
pub mod events;
pub mod types;
