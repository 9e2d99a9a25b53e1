//! Transport layer for Mentorbot.
//!
//! A [`Transport`] accepts connections. Each connection splits into a
//! [`FrameSender`] and a [`FrameReceiver`] so one task can block waiting
//! for the user's next message while another pushes messages to them:
//! a participant idling in their chat still gets the mentor's replies.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketReceiver, WebSocketSender,
    WebSocketTransport,
};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Send + 'static;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr>;
}

/// The outbound half of a connection.
pub trait FrameSender: Send + 'static {
    /// The error type for send operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), Self::Error>;

    /// Closes the connection from our side.
    async fn close(&mut self) -> Result<(), Self::Error>;
}

/// The inbound half of a connection.
pub trait FrameReceiver: Send + 'static {
    /// The error type for receive operations.
    type Error: std::error::Error + Send + Sync;

    /// Receives the next data frame (text or binary) as raw bytes.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    /// Control frames are skipped.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }
}
