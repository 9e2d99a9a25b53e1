//! Per-connection handler: handshake, delivery, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get Identity
//!   3. Send HandshakeAck, attach the identity's mailbox
//!   4. Spawn a writer that drains the mailbox into the socket
//!   5. Loop: receive envelopes → dispatch to the broker → deliver
//!
//! The writer owns the send half, so directives reach a user who is
//! sitting idle in the read loop.

use std::sync::Arc;

use mentorbot_broker::dispatch;
use mentorbot_protocol::{
    Codec, Envelope, EventKind, Identity, InboundEvent, Outbound,
    ProtocolError, WireMessage, PROTOCOL_VERSION,
};
use mentorbot_transport::{
    ConnectionId, FrameReceiver, FrameSender, WebSocketConnection,
    WebSocketReceiver, WebSocketSender,
};
use tokio::sync::mpsc;

use crate::config::HANDSHAKE_TIMEOUT;
use crate::mailbox::Delivery;
use crate::server::ServerState;
use crate::{Authenticator, MentorbotError};

/// Drop guard that detaches the identity's mailbox when the handler exits.
///
/// `Drop` is synchronous, so the async lock is taken in a spawned task.
struct MailboxGuard<A: Authenticator, C: Codec> {
    identity: Identity,
    conn_id: ConnectionId,
    state: Arc<ServerState<A, C>>,
}

impl<A: Authenticator, C: Codec> Drop for MailboxGuard<A, C> {
    fn drop(&mut self) {
        let identity = self.identity;
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if state.mailboxes.lock().await.detach(identity, conn_id) {
                tracing::debug!(%identity, %conn_id, "mailbox detached");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, C>>,
) -> Result<(), MentorbotError>
where
    A: Authenticator,
    C: Codec,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (mut sender, mut receiver) = conn.split();

    // --- Step 1: Handshake ---
    let (identity, username) =
        match perform_handshake(&mut sender, &mut receiver, &state).await {
            Ok(accepted) => accepted,
            Err(e) => {
                let _ = sender.close().await;
                return Err(e);
            }
        };

    tracing::info!(%conn_id, %identity, "client authenticated");

    // --- Step 2: Mailbox and writer ---
    let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let superseded =
        state
            .mailboxes
            .lock()
            .await
            .attach(identity, conn_id, mailbox_tx);
    if let Some(old) = superseded {
        tracing::info!(%identity, %old, %conn_id, "previous connection superseded");
    }
    let _guard = MailboxGuard {
        identity,
        conn_id,
        state: Arc::clone(&state),
    };

    tokio::spawn(write_frames(
        identity,
        sender,
        mailbox_rx,
        control_rx,
        Arc::clone(&state),
    ));

    // --- Step 3: Read loop ---
    loop {
        let data = match tokio::time::timeout(
            state.config.idle_timeout,
            receiver.recv(),
        )
        .await
        {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%identity, %conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%identity, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%identity, %conn_id, "connection timed out");
                let _ = control_tx.send(WireMessage::Disconnect {
                    reason: "idle timeout".into(),
                });
                break;
            }
        };

        let envelope = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%identity, error = %e, "failed to decode envelope");
                let _ = control_tx.send(WireMessage::Error {
                    code: 400,
                    message: e.to_string(),
                });
                continue;
            }
        };

        let kind = match envelope.message {
            WireMessage::Heartbeat { client_time } => {
                let _ = control_tx.send(WireMessage::HeartbeatAck {
                    client_time,
                    server_time: state.now_millis(),
                });
                continue;
            }
            WireMessage::Text { text } => EventKind::from_text(text),
            WireMessage::Press { button } => EventKind::Press(button),
            WireMessage::Disconnect { reason } => {
                tracing::info!(%identity, %reason, "client disconnected");
                break;
            }
            _ => {
                tracing::debug!(%identity, "ignoring unexpected message");
                let _ = control_tx.send(WireMessage::Error {
                    code: 400,
                    message: "unexpected message".into(),
                });
                continue;
            }
        };

        let mut event = InboundEvent::new(identity, kind);
        event.display_name = username.clone();
        route(&state, event).await;
    }

    // Dropping `control_tx` stops the writer once it has flushed any
    // queued control frames. _guard drops here → mailbox detach fires.
    Ok(())
}

/// Runs one event through the broker and delivers what it produced.
async fn route<A: Authenticator, C: Codec>(
    state: &ServerState<A, C>,
    event: InboundEvent,
) {
    let mut broker = state.broker.lock().await;
    let directives = dispatch(&mut broker, event);
    // Take the mailbox lock before releasing the broker so directives
    // from consecutive events can't overtake each other.
    let mut mailboxes = state.mailboxes.lock().await;
    drop(broker);

    for directive in directives {
        let recipient = directive.recipient;
        match mailboxes.deliver(directive) {
            Delivery::Sent => {}
            delivery => {
                tracing::debug!(%recipient, ?delivery, "recipient offline");
            }
        }
    }
}

/// Performs the initial handshake: receive Handshake, validate, auth,
/// send Ack. Returns the identity and the client-supplied username.
async fn perform_handshake<A, C>(
    sender: &mut WebSocketSender,
    receiver: &mut WebSocketReceiver,
    state: &ServerState<A, C>,
) -> Result<(Identity, Option<String>), MentorbotError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, receiver.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            send_error(sender, state, 408, "handshake timed out").await?;
            return Err(ProtocolError::InvalidMessage(
                "handshake timed out".into(),
            )
            .into());
        }
    };

    let envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_error(sender, state, 400, &e.to_string()).await?;
            return Err(e.into());
        }
    };

    let (version, token, username) = match envelope.message {
        WireMessage::Handshake {
            version,
            token,
            username,
        } => (version, token, username),
        _ => {
            send_error(sender, state, 400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Handshake".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            sender,
            state,
            400,
            &format!(
                "version mismatch: expected {PROTOCOL_VERSION}, got {version}"
            ),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage(
            "protocol version mismatch".into(),
        )
        .into());
    }

    let identity = match state
        .auth
        .authenticate(token.as_deref().unwrap_or(""))
        .await
    {
        Ok(identity) => identity,
        Err(e) => {
            send_error(sender, state, 401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    let ack = WireMessage::HandshakeAck {
        identity,
        server_time: state.now_millis(),
    };
    send_message(sender, state, 0, ack).await?;

    let username = username.filter(|name| !name.trim().is_empty());
    Ok((identity, username))
}

/// Drains the control channel and the mailbox into the socket.
///
/// Control frames (acks, errors, disconnects) go first. Ends when the
/// handler drops its control sender, when a newer connection for the
/// same identity takes the mailbox over, or when a send fails. Whatever
/// is still in the mailbox at that point goes back to [`Mailboxes`].
///
/// [`Mailboxes`]: crate::mailbox::Mailboxes
async fn write_frames<A, C>(
    identity: Identity,
    mut sender: WebSocketSender,
    mut mailbox: mpsc::UnboundedReceiver<Outbound>,
    mut control: mpsc::UnboundedReceiver<WireMessage>,
    state: Arc<ServerState<A, C>>,
) where
    A: Authenticator,
    C: Codec,
{
    let conn_id = sender.id();
    let mut seq: u64 = 1;

    loop {
        let message = tokio::select! {
            biased;
            control_msg = control.recv() => match control_msg {
                Some(message) => message,
                None => break,
            },
            delivery = mailbox.recv() => match delivery {
                Some(outbound) => WireMessage::deliver(&outbound),
                None => {
                    tracing::info!(%conn_id, "mailbox taken over, closing");
                    WireMessage::Disconnect {
                        reason: "superseded by a newer connection".into(),
                    }
                }
            },
        };

        let last = matches!(message, WireMessage::Disconnect { .. });
        if let Err(e) =
            send_message(&mut sender, &state, next_seq(&mut seq), message).await
        {
            tracing::debug!(%conn_id, error = %e, "send failed");
            break;
        }
        if last {
            break;
        }
    }

    let _ = sender.close().await;
    return_undelivered(identity, conn_id, &mut mailbox, &state).await;
}

/// Closes the writer's mailbox channel and parks what was left in it.
///
/// Closing first means later deliveries fail over to the pending queue
/// instead of landing in a channel nobody reads.
async fn return_undelivered<A, C>(
    identity: Identity,
    conn_id: ConnectionId,
    mailbox: &mut mpsc::UnboundedReceiver<Outbound>,
    state: &ServerState<A, C>,
) where
    A: Authenticator,
    C: Codec,
{
    mailbox.close();
    let leftovers: Vec<Outbound> =
        std::iter::from_fn(|| mailbox.try_recv().ok()).collect();
    state
        .mailboxes
        .lock()
        .await
        .return_undelivered(identity, conn_id, leftovers);
}

/// Encodes `message` in an envelope and sends it.
async fn send_message<A: Authenticator, C: Codec>(
    sender: &mut WebSocketSender,
    state: &ServerState<A, C>,
    seq: u64,
    message: WireMessage,
) -> Result<(), MentorbotError> {
    let envelope = Envelope::new(seq, state.now_millis(), message);
    let frame = state.codec.encode(&envelope)?;
    sender.send_text(frame).await?;
    Ok(())
}

/// Sends a `WireMessage::Error` frame during the handshake.
async fn send_error<A: Authenticator, C: Codec>(
    sender: &mut WebSocketSender,
    state: &ServerState<A, C>,
    code: u16,
    message: &str,
) -> Result<(), MentorbotError> {
    let error = WireMessage::Error {
        code,
        message: message.to_string(),
    };
    send_message(sender, state, 0, error).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
