//! Per-identity outbound delivery.
//!
//! The broker addresses directives to identities, not connections. A
//! [`Mailboxes`] resolves that: an identity with a live connection gets
//! the directive pushed onto its writer channel straight away; an identity
//! that is offline gets it parked in a bounded queue that is flushed the
//! next time it connects.
//!
//! ```text
//! deliver(Outbound) ─→ live?  ── yes ─→ writer channel ─→ socket
//!                       │
//!                       └─ no ─→ pending queue (oldest dropped when full)
//!                                   │
//!          attach(identity, ..) ────┘ flush in order
//! ```
//!
//! A directive counts as [`Delivery::Sent`] once it is on the writer
//! channel, not once it is on the wire. A writer that stops with
//! directives still in its channel hands them back through
//! [`Mailboxes::return_undelivered`].

use std::collections::{HashMap, VecDeque};

use mentorbot_protocol::{Identity, Outbound};
use mentorbot_transport::ConnectionId;
use tokio::sync::mpsc;

/// What happened to a delivered directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Handed to a live connection's writer.
    Sent,
    /// Parked until the recipient connects.
    Queued,
    /// Parked, and the oldest parked directive was dropped to make room.
    QueuedDroppingOldest,
    /// Dropped: offline and the queue holds nothing.
    Dropped,
}

/// A live connection's delivery channel.
#[derive(Debug)]
struct Live {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

/// Routes directives to live connections or holds them for later.
#[derive(Debug)]
pub(crate) struct Mailboxes {
    capacity: usize,
    live: HashMap<Identity, Live>,
    pending: HashMap<Identity, VecDeque<Outbound>>,
}

impl Mailboxes {
    /// Creates an empty set of mailboxes holding at most `capacity`
    /// directives per offline identity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            live: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Binds `identity` to a live connection and flushes anything held
    /// for it, oldest first.
    ///
    /// If the identity already had a live connection, that one is
    /// superseded: its channel sender is dropped (so its writer sees the
    /// channel close) and its id is returned.
    pub fn attach(
        &mut self,
        identity: Identity,
        conn_id: ConnectionId,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> Option<ConnectionId> {
        if let Some(held) = self.pending.remove(&identity) {
            tracing::debug!(%identity, count = held.len(), "flushing held directives");
            for outbound in held {
                // The receiver is alive: the caller just created it.
                let _ = tx.send(outbound);
            }
        }

        self.live
            .insert(identity, Live { conn_id, tx })
            .map(|old| old.conn_id)
    }

    /// Unbinds `identity` if (and only if) `conn_id` is still its live
    /// connection. Returns whether anything was removed.
    ///
    /// A superseded connection detaching late must not unbind its
    /// replacement, hence the id check.
    pub fn detach(&mut self, identity: Identity, conn_id: ConnectionId) -> bool {
        match self.live.get(&identity) {
            Some(live) if live.conn_id == conn_id => {
                self.live.remove(&identity);
                true
            }
            _ => false,
        }
    }

    /// Delivers one directive.
    pub fn deliver(&mut self, outbound: Outbound) -> Delivery {
        let recipient = outbound.recipient;

        let outbound = match self.live.get(&recipient) {
            Some(live) => match live.tx.send(outbound) {
                Ok(()) => return Delivery::Sent,
                // Writer is gone but the handler hasn't detached yet.
                Err(mpsc::error::SendError(outbound)) => {
                    self.live.remove(&recipient);
                    outbound
                }
            },
            None => outbound,
        };

        if self.capacity == 0 {
            tracing::debug!(%recipient, "recipient offline, directive dropped");
            return Delivery::Dropped;
        }

        let queue = self.pending.entry(recipient).or_default();
        queue.push_back(outbound);
        if queue.len() > self.capacity {
            queue.pop_front();
            tracing::debug!(%recipient, "mailbox full, oldest directive dropped");
            Delivery::QueuedDroppingOldest
        } else {
            Delivery::Queued
        }
    }

    /// Takes back directives a stopped writer never sent.
    ///
    /// Unbinds `conn_id` if it is still live. `leftovers` are older than
    /// anything delivered since, so they go to the front of the pending
    /// queue; if a newer connection is already live they go straight to
    /// it instead.
    pub fn return_undelivered(
        &mut self,
        identity: Identity,
        conn_id: ConnectionId,
        leftovers: Vec<Outbound>,
    ) {
        self.detach(identity, conn_id);
        if leftovers.is_empty() {
            return;
        }
        tracing::debug!(%identity, count = leftovers.len(), "returning undelivered directives");

        if self.live.contains_key(&identity) {
            for outbound in leftovers {
                self.deliver(outbound);
            }
            return;
        }
        if self.capacity == 0 {
            return;
        }

        let queue = self.pending.entry(identity).or_default();
        for outbound in leftovers.into_iter().rev() {
            queue.push_front(outbound);
        }
        while queue.len() > self.capacity {
            queue.pop_front();
        }
    }

    /// Number of identities with a live connection.
    pub fn online_count(&self) -> usize {
        self.live.len()
    }

    /// Directives held across all offline identities.
    pub fn held_count(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    #[cfg(test)]
    fn is_online(&self, identity: Identity) -> bool {
        self.live.contains_key(&identity)
    }

    #[cfg(test)]
    fn held(&self, identity: Identity) -> usize {
        self.pending.get(&identity).map_or(0, VecDeque::len)
    }
}
