//! Shared vocabulary for Mentorbot.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Domain types** ([`Identity`], [`Button`], [`Command`],
//!   [`InboundEvent`], [`Outbound`]) — what the broker consumes and
//!   produces. They know nothing about sockets.
//! - **Wire types** ([`Envelope`], [`WireMessage`]) — how those events and
//!   directives travel between a client and the gateway.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become
//!   frames and back.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Gateway (InboundEvent) → Broker
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::{Codec, DEFAULT_MAX_FRAME_BYTES};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Button, Command, EventKind, Identity, InboundEvent, Outbound,
};
pub use wire::{ButtonView, Envelope, WireMessage, PROTOCOL_VERSION};
