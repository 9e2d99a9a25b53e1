//! Error types for the protocol layer.

/// Errors that can occur while turning frames into envelopes and back.
///
/// Anything here means a client sent something we can't understand (or we
/// failed to serialize a reply). None of it reaches the broker: the gateway
/// answers with a `WireMessage::Error` frame and carries on.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag,
    /// or a missing field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame exceeds the codec's size limit. Checked before parsing,
    /// so an oversized frame is never handed to the JSON parser. Bounding
    /// what gets buffered in the first place is the transport's job.
    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    /// The frame parsed but breaks a protocol rule (e.g. the first frame
    /// on a connection isn't a handshake).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
