//! Codec trait and the JSON implementation.
//!
//! The rest of the server only needs "something that implements [`Codec`]";
//! the wire format today is JSON text frames.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to text frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a frame back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the frame is malformed or does not
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use twentyone_protocol::{Codec, Envelope, JsonCodec, MessageKind, StartNotice, RoomId};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(
///     MessageKind::Start,
///     &StartNotice { room_id: RoomId::from("12345") },
/// ).unwrap();
///
/// let frame = codec.encode(&envelope).unwrap();
/// assert_eq!(frame, r#"{"type":"start","data":{"roomId":"12345"}}"#);
///
/// let decoded: Envelope = codec.decode(&frame).unwrap();
/// assert_eq!(decoded, envelope);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        frame: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(frame).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Envelope, MessageKind};

    #[test]
    fn test_decode_malformed_json_is_decode_error() {
        let err = JsonCodec.decode::<Envelope>("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_missing_type_is_decode_error() {
        let err = JsonCodec
            .decode::<Envelope>(r#"{"data":{"roomId":"1"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        let frame = JsonCodec
            .encode(&Envelope::error("room not found"))
            .unwrap();
        assert_eq!(frame, r#"{"type":"error","error":"room not found"}"#);
    }

    #[test]
    fn test_decode_unknown_kind_is_not_an_error() {
        let envelope: Envelope =
            JsonCodec.decode(r#"{"type":"fold"}"#).unwrap();
        assert_eq!(envelope.kind, MessageKind::Unknown);
    }
}
