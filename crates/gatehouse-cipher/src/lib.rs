//! RSA credential encryption for Gatehouse.
//!
//! Passwords never leave the client in plaintext. Before every
//! credential submission the client asks the server for a public key
//! and a timestamp, then sends
//! `base64(RSA_PKCS1v15(key, "{timestamp}_{password}"))`.
//!
//! - [`PublicKeySource`]: where key material comes from. The
//!   [`HttpClient`](gatehouse_http::HttpClient) implementation calls
//!   `POST /api/account/getpublickey`.
//! - [`CredentialCipher`]: fetch-then-encrypt, plus a cached-key
//!   synchronous variant for callers that cannot await.

mod cipher;
mod error;
mod key;
mod source;

pub use cipher::{CredentialCipher, Credentials};
pub use error::CipherError;
pub use key::parse_public_key;
pub use source::{PublicKeySource, PUBLIC_KEY_PATH};
