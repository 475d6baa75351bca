//! Credential encryption.
//!
//! # The exchange
//!
//! ```text
//! client                                server
//!   │── POST /api/account/getpublickey ──▶│
//!   │◀── { rsapublickey, timestamp } ─────│
//!   │                                      │
//!   │  base64(RSA_PKCS1v15("{timestamp}_{password}"))
//!   │── POST /api/account/login ─────────▶│  (checks the timestamp window)
//! ```
//!
//! Every [`CredentialCipher::encrypt`] call fetches fresh material, so
//! a ciphertext is only valid for about a minute. A list of credentials
//! encrypted in one call shares one fetch.

use std::sync::{PoisonError, RwLock};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::{parse_public_key, CipherError, PublicKeySource};

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// One credential string or an ordered list of them.
///
/// Encryption preserves the shape: a single value stays single, a list
/// keeps its length and order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Single(String),
    List(Vec<String>),
}

impl Credentials {
    fn try_map<F>(self, mut f: F) -> Result<Self, CipherError>
    where
        F: FnMut(&str) -> Result<String, CipherError>,
    {
        match self {
            Self::Single(value) => Ok(Self::Single(f(&value)?)),
            Self::List(values) => values
                .iter()
                .map(|value| f(value))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
        }
    }

    /// The values, in order.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::Single(value) => vec![value],
            Self::List(values) => values,
        }
    }
}

impl From<String> for Credentials {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for Credentials {
    fn from(value: &str) -> Self {
        Self::Single(value.to_owned())
    }
}

impl From<Vec<String>> for Credentials {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

// ---------------------------------------------------------------------------
// CredentialCipher
// ---------------------------------------------------------------------------

/// Encrypts credentials with server-issued RSA keys.
pub struct CredentialCipher<S> {
    source: S,
    /// Key installed by [`init_public_key`](Self::init_public_key) for
    /// [`encrypt_sync`](Self::encrypt_sync).
    cached: RwLock<Option<RsaPublicKey>>,
}

impl<S: PublicKeySource> CredentialCipher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches fresh key material. One request, no retry.
    pub async fn fetch_public_key(
        &self,
    ) -> Result<gatehouse_protocol::PublicKeyMaterial, CipherError> {
        self.source.fetch_public_key().await
    }

    /// Encrypts every value as `"{timestamp}_{value}"` under one freshly
    /// fetched key.
    ///
    /// # Errors
    /// Fetch failures propagate unchanged; a key that does not parse is
    /// [`CipherError::InvalidKey`].
    pub async fn encrypt(&self, credentials: Credentials) -> Result<Credentials, CipherError> {
        let (key, timestamp) = self.fresh_key().await?;
        credentials.try_map(|plain| encrypt_with(&key, &format!("{timestamp}_{plain}")))
    }

    /// Encrypts a single value.
    pub async fn encrypt_one(&self, plain: &str) -> Result<String, CipherError> {
        let (key, timestamp) = self.fresh_key().await?;
        encrypt_with(&key, &format!("{timestamp}_{plain}"))
    }

    /// Encrypts two values under the same key and timestamp.
    pub async fn encrypt_pair(
        &self,
        first: &str,
        second: &str,
    ) -> Result<(String, String), CipherError> {
        let (key, timestamp) = self.fresh_key().await?;
        Ok((
            encrypt_with(&key, &format!("{timestamp}_{first}"))?,
            encrypt_with(&key, &format!("{timestamp}_{second}"))?,
        ))
    }

    async fn fresh_key(&self) -> Result<(RsaPublicKey, i64), CipherError> {
        let material = self.fetch_public_key().await?;
        let key = parse_public_key(&material.public_key)?;
        Ok((key, material.timestamp))
    }

    /// Fetches a key once and caches it for [`encrypt_sync`](Self::encrypt_sync).
    pub async fn init_public_key(&self) -> Result<(), CipherError> {
        let (key, _) = self.fresh_key().await?;
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
        tracing::info!("public key cached");
        Ok(())
    }

    /// Whether [`init_public_key`](Self::init_public_key) has succeeded.
    pub fn has_cached_key(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Encrypts with the cached key, without the timestamp prefix.
    ///
    /// With no cached key the input is returned unchanged, i.e. as
    /// plaintext. Callers that cannot accept that must call
    /// [`init_public_key`](Self::init_public_key) first or use
    /// [`encrypt`](Self::encrypt).
    pub fn encrypt_sync(&self, credentials: Credentials) -> Result<Credentials, CipherError> {
        let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        let Some(key) = cached.as_ref() else {
            tracing::warn!("no cached public key, credentials passed through unencrypted");
            return Ok(credentials);
        };
        credentials.try_map(|plain| encrypt_with(key, plain))
    }
}

impl<S> std::fmt::Debug for CredentialCipher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self
            .cached
            .read()
            .map(|key| key.is_some())
            .unwrap_or(false);
        f.debug_struct("CredentialCipher")
            .field("cached_key", &cached)
            .finish_non_exhaustive()
    }
}

fn encrypt_with(key: &RsaPublicKey, plain: &str) -> Result<String, CipherError> {
    let ciphertext = key
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, plain.as_bytes())
        .map_err(CipherError::Encrypt)?;
    Ok(STANDARD.encode(ciphertext))
}
