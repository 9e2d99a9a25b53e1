//! `MentorbotServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → broker, with the
//! mailboxes carrying broker directives back out to connections.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mentorbot_broker::{Broker, BrokerConfig};
use mentorbot_protocol::{Codec, JsonCodec};
use mentorbot_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::mailbox::Mailboxes;
use crate::{Authenticator, GatewayConfig, MentorbotError};

/// Shared server state passed to each connection handler task.
///
/// Lock order is `broker` then `mailboxes`; nothing takes them the other
/// way round.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) broker: Arc<Mutex<Broker>>,
    pub(crate) mailboxes: Arc<Mutex<Mailboxes>>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: GatewayConfig,
    pub(crate) started: Instant,
}

impl<A: Authenticator, C: Codec> ServerState<A, C> {
    /// Milliseconds since the server started, for envelope timestamps.
    pub(crate) fn now_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Mentorbot gateway.
///
/// # Example
///
/// ```rust,ignore
/// use mentorbot::prelude::*;
///
/// let server = MentorbotServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(BrokerConfig::new(Identity(1), "secret"), TrustedIdAuthenticator)
///     .await?;
/// server.run().await
/// ```
pub struct MentorbotServerBuilder {
    config: GatewayConfig,
}

impl MentorbotServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    /// Sets the address to bind the WebSocket listener to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a silent connection is kept open.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets how many directives are held per offline identity.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Replaces the whole gateway configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the broker config, binds the listener, and returns a
    /// server ready to [`run`](MentorbotServer::run).
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    ///
    /// # Errors
    /// - [`MentorbotError::Config`] if `broker_config` is unusable
    /// - [`MentorbotError::Transport`] if the address can't be bound
    pub async fn build<A: Authenticator>(
        self,
        broker_config: BrokerConfig,
        auth: A,
    ) -> Result<MentorbotServer<A, JsonCodec>, MentorbotError> {
        broker_config.validate()?;

        let transport = WebSocketTransport::bind(&self.config.bind_addr)
            .await?
            .with_max_message_size(self.config.max_frame_bytes);
        let codec = JsonCodec::with_limit(self.config.max_frame_bytes);

        let state = Arc::new(ServerState {
            broker: Arc::new(Mutex::new(Broker::new(broker_config))),
            mailboxes: Arc::new(Mutex::new(Mailboxes::new(
                self.config.mailbox_capacity,
            ))),
            auth,
            codec,
            config: self.config,
            started: Instant::now(),
        });

        Ok(MentorbotServer { transport, state })
    }
}

impl Default for MentorbotServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Mentorbot gateway.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MentorbotServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> MentorbotServer<A, C> {
    /// Returns the local address the gateway is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the broker, shared with the connection handlers.
    pub fn broker(&self) -> Arc<Mutex<Broker>> {
        Arc::clone(&self.state.broker)
    }

    /// The health endpoint router, reporting on this server's broker and
    /// connections.
    pub fn health_router(&self) -> axum::Router {
        crate::health::router(
            self.broker(),
            Arc::clone(&self.state.mailboxes),
            self.state.started,
        )
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per accepted connection. Runs until the
    /// process is terminated; a failed accept is logged and skipped.
    pub async fn run(mut self) -> Result<(), MentorbotError> {
        let mentor = self.state.broker.lock().await.mentor();
        tracing::info!(%mentor, "Mentorbot gateway running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
