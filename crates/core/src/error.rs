use crate::classify::{classify_error, ErrorClass, FatalReason};

/// Notice shown to the user whenever the session has to be torn down.
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

/// Where an expiry was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySource {
    /// The client decoded the credential and found `exp` in the past.
    Decoded,
    /// The server rejected the credential as expired.
    Server,
}

/// Failures observed by the realtime connection manager.
///
/// None of these are returned to callers of `connect`/`disconnect`; they
/// drive internal transitions and the user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Recoverable: triggers the refresh protocol.
    #[error("Credential expired ({origin:?})")]
    Expiry { origin: ExpirySource },

    /// The server rejected the credential in a way no refresh can fix.
    #[error("Fatal authentication error ({reason}): {message}")]
    FatalAuth { reason: FatalReason, message: String },

    /// The refresh call failed or no refresh credential was available.
    #[error("Credential refresh failed: {0}")]
    RefreshFailure(String),

    /// Any other connection error. Observed only.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Build the taxonomy entry for a transport-level error message.
    pub fn from_connection_error(message: &str) -> Self {
        match classify_error(message) {
            ErrorClass::Expired => Self::Expiry {
                origin: ExpirySource::Server,
            },
            ErrorClass::Fatal(reason) => Self::FatalAuth {
                reason,
                message: message.to_string(),
            },
            ErrorClass::Transient => Self::Transport(message.to_string()),
        }
    }

    /// Whether the error terminates the session (credentials cleared).
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::FatalAuth { .. } | Self::RefreshFailure(_))
    }

    /// Message to surface to the user, if any.
    pub fn user_notice(&self) -> Option<&'static str> {
        if self.ends_session() {
            Some(SESSION_EXPIRED_NOTICE)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn expired_message_maps_to_server_expiry() {
        assert_eq!(
            SessionError::from_connection_error("jwt expired"),
            SessionError::Expiry {
                origin: ExpirySource::Server
            }
        );
    }

    #[test]
    fn fatal_message_keeps_original_text() {
        assert_matches!(
            SessionError::from_connection_error("invalid signature"),
            SessionError::FatalAuth { reason: FatalReason::InvalidSignature, message } if message == "invalid signature"
        );
    }

    #[test]
    fn only_terminal_errors_produce_a_notice() {
        let expiry = SessionError::Expiry {
            origin: ExpirySource::Decoded,
        };
        assert_eq!(expiry.user_notice(), None);
        assert_eq!(SessionError::Transport("timeout".into()).user_notice(), None);
        assert_eq!(
            SessionError::RefreshFailure("401".into()).user_notice(),
            Some(SESSION_EXPIRED_NOTICE)
        );
        assert!(SessionError::from_connection_error("jwt malformed").ends_session());
    }
}
