//! Runs the Mentorbot gateway next to its health endpoint.
//!
//! Configuration comes from flags, falling back to environment variables
//! (a `.env` file in the working directory is loaded first).
//!
//! Clients authenticate with an HS256 token signed with `TOKEN_SECRET`.
//! `--issue-token <IDENTITY>` prints one and exits.

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use mentorbot::{
    GatewayConfig, MentorbotServerBuilder, SignedTokenAuthenticator, TokenIssuer,
};
use mentorbot_broker::BrokerConfig;
use mentorbot_protocol::{DEFAULT_MAX_FRAME_BYTES, Identity};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Shortest accepted token secret, in bytes.
const MIN_TOKEN_SECRET_BYTES: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "mentorbot-server", about = "One mentor, many participants, one chat at a time")]
#[command(version)]
struct Args {
    /// Identity of the mentor
    #[arg(long, env = "MENTOR_ID")]
    mentor_id: u64,

    /// Shared password participants type to register
    #[arg(long, env = "ACCESS_PASSWORD", hide_env_values = true)]
    access_password: String,

    /// Secret that signs client tokens (at least 32 bytes)
    #[arg(long, env = "TOKEN_SECRET", hide_env_values = true)]
    token_secret: String,

    /// Print a token for this identity and exit
    #[arg(long, value_name = "IDENTITY")]
    issue_token: Option<u64>,

    /// Lifetime of tokens printed by --issue-token, in seconds
    #[arg(long, env = "TOKEN_TTL_SECS", default_value_t = 30 * 24 * 60 * 60)]
    token_ttl_secs: u64,

    /// Address the WebSocket gateway listens on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: String,

    /// Port for the HTTP health endpoint
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Seconds a silent connection is kept open
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Directives held per offline identity
    #[arg(long, env = "MAILBOX_CAPACITY", default_value_t = 32)]
    mailbox_capacity: usize,

    /// Largest inbound frame accepted, in bytes
    #[arg(long, env = "MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,

    /// Name shown for the mentor when the client sends none
    #[arg(long, env = "MENTOR_NAME")]
    mentor_name: Option<String>,

    /// Name given to participants who sign in anonymously
    #[arg(long, env = "ANONYMOUS_LABEL")]
    anonymous_label: Option<String>,

    /// Placeholder for identities with no registered name
    #[arg(long, env = "UNKNOWN_NAME")]
    unknown_name: Option<String>,
}

impl Args {
    fn broker_config(&self) -> BrokerConfig {
        let mut config =
            BrokerConfig::new(Identity(self.mentor_id), self.access_password.clone());
        if let Some(name) = &self.mentor_name {
            config.mentor_fallback_name = name.clone();
        }
        if let Some(label) = &self.anonymous_label {
            config.anonymous_label = label.clone();
        }
        if let Some(name) = &self.unknown_name {
            config.unknown_name = name.clone();
        }
        config
    }

    fn token_secret(&self) -> Result<&[u8]> {
        let secret = self.token_secret.as_bytes();
        ensure!(
            secret.len() >= MIN_TOKEN_SECRET_BYTES,
            "TOKEN_SECRET must be at least {MIN_TOKEN_SECRET_BYTES} bytes"
        );
        Ok(secret)
    }

    fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            bind_addr: self.bind_addr.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            mailbox_capacity: self.mailbox_capacity,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let token_secret = args.token_secret()?;

    if let Some(identity) = args.issue_token {
        let token = TokenIssuer::new(token_secret)
            .issue(Identity(identity), Duration::from_secs(args.token_ttl_secs))
            .context("failed to issue token")?;
        println!("{token}");
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(true))
        .init();

    let broker_config = args.broker_config();
    broker_config
        .validate()
        .context("invalid broker configuration")?;

    let server = MentorbotServerBuilder::new()
        .config(args.gateway_config())
        .build(broker_config, SignedTokenAuthenticator::new(token_secret))
        .await
        .context("failed to start the gateway")?;
    let health = server.health_router();

    let health_addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&health_addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {health_addr}"))?;
    tracing::info!(addr = %health_addr, "health endpoint listening");

    tokio::select! {
        result = server.run() => result.context("gateway stopped")?,
        result = axum::serve(listener, health).into_future() => {
            result.context("health endpoint stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
