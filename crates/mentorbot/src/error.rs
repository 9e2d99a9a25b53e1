//! Unified error type for the Mentorbot gateway.

use mentorbot_broker::ConfigError;
use mentorbot_protocol::ProtocolError;
use mentorbot_transport::TransportError;

use crate::AuthError;

/// Top-level error that wraps every crate-specific error.
///
/// Each `#[from]` variant lets `?` convert sub-crate errors directly.
/// Broker [`Rejection`](mentorbot_broker::Rejection)s are not here: they
/// are user-facing notices, never connection failures.
#[derive(Debug, thiserror::Error)]
pub enum MentorbotError {
    /// A transport-level error (bind, accept, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The broker configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The handshake token was refused.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Socket setup outside the transport (the health listener).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let wrapped: MentorbotError = err.into();
        assert!(matches!(wrapped, MentorbotError::Protocol(_)));
        assert!(wrapped.to_string().contains("bad"));
    }

    #[test]
    fn test_from_config_error() {
        let wrapped: MentorbotError = ConfigError::MissingSecret.into();
        assert!(matches!(wrapped, MentorbotError::Config(_)));
        assert_eq!(wrapped.to_string(), "access secret is not configured");
    }

    #[test]
    fn test_from_auth_error() {
        let wrapped: MentorbotError = AuthError::MissingToken.into();
        assert!(matches!(wrapped, MentorbotError::Auth(_)));
    }

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let wrapped: MentorbotError = TransportError::Bind(io).into();
        assert!(matches!(wrapped, MentorbotError::Transport(_)));
        assert!(wrapped.to_string().contains("taken"));
    }
}
