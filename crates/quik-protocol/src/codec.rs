//! Codec trait and implementations for turning events into bytes.
//!
//! The server never touches `serde_json` directly; it holds something that
//! implements [`Codec`]. JSON is the only format today because the web
//! client speaks it, but nothing above this module depends on that.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// describe a `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`, behind the `json` feature (on by
/// default).
///
/// ```rust
/// use quik_protocol::{Codec, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerEvent::Tick { countdown: 3 }).unwrap();
/// let back: ServerEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(back, ServerEvent::Tick { countdown: 3 });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::ClientEvent;

    #[test]
    fn test_decode_unknown_event_type_fails() {
        let err = JsonCodec
            .decode::<ClientEvent>(br#"{"type":"fly-away"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
        assert!(err.to_string().starts_with("decode failed"));
    }

    #[test]
    fn test_decode_truncated_input_fails() {
        let err = JsonCodec
            .decode::<ClientEvent>(br#"{"type":"end-tu"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_produces_json_text() {
        let bytes = JsonCodec.encode(&ClientEvent::LeaveRoom).unwrap();
        assert_eq!(bytes, br#"{"type":"leave-room"}"#);
    }
}
