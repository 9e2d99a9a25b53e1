//! HTTP liveness and health endpoint.
//!
//! Hosting platforms want something answering on a port; this is it.
//! `GET /` returns plain text, `GET /health` a JSON snapshot of the broker
//! and the gateway's connections.

use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, routing::get};
use mentorbot_broker::Broker;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::mailbox::Mailboxes;

/// Body of `GET /`.
pub const LIVENESS_TEXT: &str = "Mentorbot is running";

/// Shared state for the health routes.
#[derive(Clone)]
struct HealthState {
    broker: Arc<Mutex<Broker>>,
    mailboxes: Arc<Mutex<Mailboxes>>,
    started: Instant,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the endpoint answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the gateway started.
    pub uptime_seconds: u64,
    /// Registered identities.
    pub registered: usize,
    /// Participants on the waitlist.
    pub waiting: usize,
    /// Whether the mentor is in a chat.
    pub session_active: bool,
    /// Identities with a live connection.
    pub online: usize,
    /// Directives waiting for offline identities.
    pub held: usize,
}

/// Builds the health router. Reached through
/// [`MentorbotServer::health_router`](crate::MentorbotServer::health_router).
pub(crate) fn router(
    broker: Arc<Mutex<Broker>>,
    mailboxes: Arc<Mutex<Mailboxes>>,
    started: Instant,
) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .with_state(HealthState {
            broker,
            mailboxes,
            started,
        })
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let stats = state.broker.lock().await.stats();
    let (online, held) = {
        let mailboxes = state.mailboxes.lock().await;
        (mailboxes.online_count(), mailboxes.held_count())
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
        registered: stats.registered,
        waiting: stats.waiting,
        session_active: stats.session_active,
        online,
        held,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use mentorbot_broker::BrokerConfig;
    use mentorbot_protocol::{Identity, Outbound};

    fn broker() -> Arc<Mutex<Broker>> {
        Arc::new(Mutex::new(Broker::new(BrokerConfig::new(Identity(1), "pw"))))
    }

    fn mailboxes() -> Arc<Mutex<Mailboxes>> {
        Arc::new(Mutex::new(Mailboxes::new(4)))
    }

    #[tokio::test]
    async fn test_root_returns_liveness_text() {
        let server =
            TestServer::new(router(broker(), mailboxes(), Instant::now())).unwrap();

        let response = server.get("/").await;

        response.assert_status_ok();
        response.assert_text(LIVENESS_TEXT);
    }

    #[tokio::test]
    async fn test_health_reports_broker_counts() {
        let broker = broker();
        {
            let mut b = broker.lock().await;
            b.submit_password(Identity(1), None, "pw").unwrap();
            b.submit_password(Identity(2), Some("ada"), "pw").unwrap();
            b.mentor_connect(Identity(1)).unwrap();
        }
        let server =
            TestServer::new(router(broker, mailboxes(), Instant::now())).unwrap();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(body.registered, 2);
        assert_eq!(body.waiting, 0);
        assert!(body.session_active);
    }

    #[tokio::test]
    async fn test_health_reports_connections_and_held_directives() {
        let mailboxes = mailboxes();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        {
            let mut boxes = mailboxes.lock().await;
            boxes.attach(Identity(1), mentorbot_transport::ConnectionId::new(9), tx);
            boxes.deliver(Outbound::notice(Identity(2), "later"));
            boxes.deliver(Outbound::notice(Identity(3), "later"));
        }
        let server =
            TestServer::new(router(broker(), mailboxes, Instant::now())).unwrap();

        let body: HealthResponse = server.get("/health").await.json();

        assert_eq!(body.online, 1);
        assert_eq!(body.held, 2);
    }
}
