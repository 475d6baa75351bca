//! Error types for the protocol layer.
//!
//! Each crate in Gatehouse defines its own error enum. A `ProtocolError`
//! always means the bytes on the wire did not match the expected shape,
//! never that the network or the server misbehaved.

/// Errors that can occur while encoding or decoding wire types.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// wrong data types, or truncated messages.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates a protocol rule, e.g. a
    /// response envelope that is not a JSON object.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
