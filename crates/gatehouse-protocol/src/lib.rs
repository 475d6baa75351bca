//! Wire protocol for Gatehouse.
//!
//! This crate defines the "language" the client speaks with the backend:
//!
//! - **Types** ([`ApiEnvelope`], [`PublicKeyMaterial`], [`HandshakeFrame`],
//!   login DTOs) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets, storage or tokens.
//! It sits under every other Gatehouse crate:
//!
//! ```text
//! HTTP / realtime (bytes) → Protocol (envelopes, frames) → Session / Auth
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ApiEnvelope, ErrorCode, HandshakeData, HandshakeFrame, LoginPayload,
    LoginRequest, PublicKeyMaterial, ENCRYPT_TYPE_RSA, HANDSHAKE_CMD,
};
