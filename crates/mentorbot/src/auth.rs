//! Handshake authentication.
//!
//! The gateway doesn't decide who a client is; an [`Authenticator`] does.
//! It receives the handshake token and returns the [`Identity`] the broker
//! will see. Two implementations ship:
//!
//! - [`SignedTokenAuthenticator`] checks an HS256 JWT whose `sub` is the
//!   identity. Tokens come from a [`TokenIssuer`] holding the same secret.
//! - [`TrustedIdAuthenticator`] takes the token as the identity. Only for
//!   a gateway that is reachable solely through a bridge that already
//!   authenticated the user.
//!
//! Whoever holds the mentor's identity can still only act as mentor after
//! typing the access password; the broker checks that separately.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mentorbot_protocol::Identity;
use serde::{Deserialize, Serialize};

/// Why a handshake token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The handshake carried no token.
    #[error("missing token")]
    MissingToken,

    /// The token was present but not acceptable.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's signature checked out but it has expired.
    #[error("token has expired")]
    Expired,

    /// A token couldn't be issued.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Maps a handshake token to an identity.
///
/// `Send + Sync + 'static` because one authenticator lives in the shared
/// server state and is called from every connection task.
///
/// # Example
///
/// ```rust
/// use mentorbot::{AuthError, Authenticator};
/// use mentorbot_protocol::Identity;
///
/// /// Lets exactly one hard-coded token in.
/// struct SingleUser;
///
/// impl Authenticator for SingleUser {
///     async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
///         match token {
///             "letmein" => Ok(Identity(7)),
///             other => Err(AuthError::InvalidToken(other.to_string())),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns who it belongs to.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;
}

/// Accepts any positive integer token as the identity itself.
///
/// Only safe behind something that already authenticated the user (a
/// chat-platform bridge that forwards the platform's own user id, say).
/// Anyone who can reach the gateway directly can claim any identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedIdAuthenticator;

impl Authenticator for TrustedIdAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        parse_identity(token)
    }
}

// ---------------------------------------------------------------------------
// Signed tokens
// ---------------------------------------------------------------------------

/// Claims carried by a gateway token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The identity, in decimal.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
}

/// Accepts HS256 JWTs signed with a shared secret.
///
/// The identity is the token's `sub` claim; `exp` is required and checked
/// with `jsonwebtoken`'s default leeway.
pub struct SignedTokenAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl SignedTokenAuthenticator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl Authenticator for SignedTokenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        parse_identity(&data.claims.sub)
    }
}

/// Signs tokens that a [`SignedTokenAuthenticator`] with the same secret
/// accepts.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
        }
    }

    /// Issues a token for `identity`, valid for `ttl` from now.
    pub fn issue(&self, identity: Identity, ttl: Duration) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: identity.0.to_string(),
            exp: jsonwebtoken::get_current_timestamp() + ttl.as_secs(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

/// A positive decimal integer; zero is reserved.
fn parse_identity(text: &str) -> Result<Identity, AuthError> {
    match text.parse::<u64>() {
        Ok(0) | Err(_) => Err(AuthError::InvalidToken(text.to_string())),
        Ok(id) => Ok(Identity(id)),
    }
}
