//! Classification of connection error messages.
//!
//! The realtime server reports authentication problems as free-form error
//! text (e.g. `"jwt expired"`, `"invalid signature"`). All matching of that
//! text lives here so the markers are defined once and tested in isolation.
//!
//! The markers mirror the wording of the JWT library used by the current
//! backend. A backend that words its errors differently will have every
//! auth failure classified as [`ErrorClass::Transient`].

/// Marker identifying an expired credential.
pub const EXPIRED_MARKER: &str = "expired";

/// Marker identifying a credential signed with the wrong key.
pub const INVALID_SIGNATURE_MARKER: &str = "invalid signature";

/// Marker identifying a credential the server rejected outright.
pub const INVALID_TOKEN_MARKER: &str = "invalid token";

/// Marker identifying a structurally broken credential.
pub const MALFORMED_MARKER: &str = "malformed";

/// Why a credential can never be accepted, regardless of refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    InvalidSignature,
    InvalidToken,
    Malformed,
}

impl FatalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidToken => "invalid_token",
            Self::Malformed => "malformed",
        }
    }
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the connection manager should react to a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The credential expired; a refresh can recover the session.
    Expired,
    /// The credential is unusable; the session must be torn down.
    Fatal(FatalReason),
    /// Anything else. Logged, no state change.
    Transient,
}

impl ErrorClass {
    /// Whether the error ends the session.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Classify a connection error message.
///
/// Matching is case-insensitive. The expiry marker is checked first so a
/// message such as `"invalid token: jwt expired"` is recoverable.
pub fn classify_error(message: &str) -> ErrorClass {
    let message = message.to_ascii_lowercase();

    if message.contains(EXPIRED_MARKER) {
        ErrorClass::Expired
    } else if message.contains(INVALID_SIGNATURE_MARKER) {
        ErrorClass::Fatal(FatalReason::InvalidSignature)
    } else if message.contains(INVALID_TOKEN_MARKER) {
        ErrorClass::Fatal(FatalReason::InvalidToken)
    } else if message.contains(MALFORMED_MARKER) {
        ErrorClass::Fatal(FatalReason::Malformed)
    } else {
        ErrorClass::Transient
    }
}
