//! The mentor/participant session broker.
//!
//! One mentor, many participants, at most one conversation at a time.
//! This crate owns every piece of mutable state that decides who talks to
//! whom:
//!
//! - [`Broker`] — registry, active pairing, waitlist, transcripts, and
//!   the typed entry points that mutate them
//! - [`dispatch`] — classifies an [`InboundEvent`] and calls exactly one
//!   entry point, turning a [`Rejection`] into a notice for the sender
//! - [`IdentityState`] / [`Stage`] — the registration state machine
//! - [`BrokerConfig`] — mentor identity, shared secret, label literals
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← serializes events, delivers Outbound directives
//!     ↕
//! Broker (this crate)  ← registration, pairing, waitlist, history
//!     ↕
//! Protocol (below)  ← Identity, InboundEvent, Outbound, Button
//! ```
//!
//! The broker does no I/O. Every entry point runs to completion and
//! returns the directives to deliver, so the caller only has to serialize
//! access (one mutex, one task, whatever fits).
//!
//! [`InboundEvent`]: mentorbot_protocol::InboundEvent

mod broker;
mod config;
mod dispatch;
mod error;
mod state;

pub use broker::{Broker, BrokerStats};
pub use config::{BrokerConfig, ConfigError};
pub use dispatch::dispatch;
pub use error::Rejection;
pub use state::{IdentityState, Registration, Speaker, Stage, TranscriptLine};
