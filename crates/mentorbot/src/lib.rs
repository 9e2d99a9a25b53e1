//! # Mentorbot
//!
//! A WebSocket gateway in front of the Mentorbot session broker.
//!
//! Clients connect, authenticate with a token, and then exchange
//! [`WireMessage`](mentorbot_protocol::WireMessage)s: typed text and
//! button presses in, rendered messages with keyboards out. Every inbound
//! event goes through one shared [`Broker`](mentorbot_broker::Broker);
//! the directives it returns are routed to the right connection, or held
//! in a bounded mailbox until the recipient comes back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mentorbot::prelude::*;
//!
//! # async fn run() -> Result<(), MentorbotError> {
//! let auth = SignedTokenAuthenticator::new(b"a long random token secret");
//! let server = MentorbotServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(BrokerConfig::new(Identity(1), "secret"), auth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod config;
mod error;
mod handler;
pub mod health;
mod mailbox;
mod server;

pub use auth::{
    AuthError, Authenticator, SignedTokenAuthenticator, TokenClaims, TokenIssuer,
    TrustedIdAuthenticator,
};
pub use config::{GatewayConfig, HANDSHAKE_TIMEOUT};
pub use error::MentorbotError;
pub use server::{MentorbotServer, MentorbotServerBuilder};

/// Everything needed to run a gateway and talk to it.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, GatewayConfig, MentorbotError,
        MentorbotServer, MentorbotServerBuilder, SignedTokenAuthenticator,
        TokenIssuer, TrustedIdAuthenticator,
    };
    pub use mentorbot_broker::{Broker, BrokerConfig, Rejection};
    pub use mentorbot_protocol::{
        Button, ButtonView, Envelope, Identity, Outbound, PROTOCOL_VERSION,
        WireMessage,
    };
}
