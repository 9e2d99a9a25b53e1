//! Frame codec: envelopes to text frames and back.
//!
//! The gateway only ever speaks in [`Envelope`]s, so unlike a general
//! serializer the [`Codec`] trait is not generic over the value type. That
//! keeps the trait object-safe and lets the codec refuse oversized frames
//! before parsing them.

use crate::{Envelope, ProtocolError};

/// Upper bound on an inbound frame when no explicit limit is configured.
///
/// Chat messages are short; 64 KiB leaves plenty of room while keeping a
/// misbehaving client from making us parse megabytes of JSON.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Encodes envelopes to text frames and decodes raw frames into envelopes.
///
/// `Send + Sync + 'static` because one codec instance lives in the shared
/// server state and is used from every connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into a text frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError>;

    /// Parses a raw frame into an envelope.
    ///
    /// # Errors
    /// - [`ProtocolError::FrameTooLarge`] — the frame exceeds the limit
    /// - [`ProtocolError::Decode`] — the bytes aren't a valid envelope
    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that speaks JSON text frames.
///
/// ```rust
/// use mentorbot_protocol::{Codec, Envelope, JsonCodec, WireMessage};
///
/// let codec = JsonCodec::default();
/// let envelope = Envelope::new(1, 0, WireMessage::Text { text: "hi".into() });
///
/// let frame = codec.encode(&envelope).unwrap();
/// let decoded = codec.decode(frame.as_bytes()).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec {
    max_frame_bytes: usize,
}

#[cfg(feature = "json")]
impl JsonCodec {
    /// Creates a codec that rejects frames larger than `max_frame_bytes`.
    pub fn with_limit(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Returns the configured frame size limit.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

#[cfg(feature = "json")]
impl Default for JsonCodec {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }
}

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<String, ProtocolError> {
        serde_json::to_string(envelope).map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &[u8]) -> Result<Envelope, ProtocolError> {
        if frame.len() > self.max_frame_bytes {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.len(),
                limit: self.max_frame_bytes,
            });
        }
        serde_json::from_slice(frame).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Button, WireMessage};

    #[test]
    fn test_decode_oversized_frame_returns_frame_too_large() {
        let codec = JsonCodec::with_limit(16);
        let frame = vec![b' '; 17];

        let result = codec.decode(&frame);

        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { size: 17, limit: 16 })
        ));
    }

    #[test]
    fn test_decode_frame_at_limit_is_parsed() {
        let codec = JsonCodec::default();
        let frame = codec
            .encode(&Envelope::new(3, 9, WireMessage::Press {
                button: Button::CallMentor,
            }))
            .unwrap();

        let limited = JsonCodec::with_limit(frame.len());
        let decoded = limited.decode(frame.as_bytes()).unwrap();

        assert_eq!(decoded.seq, 3);
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let codec = JsonCodec::default();

        let result = codec.decode(b"not json at all");

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_default_limit_is_64_kib() {
        assert_eq!(JsonCodec::default().max_frame_bytes(), 64 * 1024);
    }
}
