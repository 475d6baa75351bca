//! Codec trait and the JSON implementation.
//!
//! Request bodies, response envelopes and the realtime handshake frame
//! all go through a [`Codec`].

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because codecs live inside long-lived clients
/// that are shared between tokio tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Serializes a value into a UTF-8 string (text frames, request bodies).
    fn encode_text<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes).map_err(|e| {
            ProtocolError::InvalidMessage(format!("encoded text is not UTF-8: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// The backend speaks JSON for both HTTP and the realtime channel, so
/// this is the only codec the clients are built with.
///
/// ## Example
///
/// ```rust
/// use gatehouse_protocol::{Codec, HandshakeFrame, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = HandshakeFrame::authenticate("u-1", Some("abc"));
///
/// let text = codec.encode_text(&frame).unwrap();
/// assert!(text.contains("\"Cmd\":1"));
///
/// let decoded: HandshakeFrame = codec.decode(text.as_bytes()).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ApiEnvelope;

    #[test]
    fn test_json_codec_decodes_envelope() {
        let codec = JsonCodec;
        let env: ApiEnvelope = codec
            .decode(br#"{"data":{"foo":1}}"#)
            .expect("should decode");
        assert_eq!(env.data["foo"], 1);
        assert!(env.error_code().is_none());
    }

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let codec = JsonCodec;
        let result: Result<ApiEnvelope, _> = codec.decode(b"<html>502</html>");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_text_produces_json_string() {
        let codec = JsonCodec;
        let text = codec
            .encode_text(&serde_json::json!({ "usericon": "f-1" }))
            .unwrap();
        assert_eq!(text, r#"{"usericon":"f-1"}"#);
    }
}
