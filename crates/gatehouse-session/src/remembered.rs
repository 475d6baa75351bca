//! The "remember password" login-form prefill.
//!
//! Stored in the durable area as base64 (standard alphabet) of the JSON
//! object `{"account": .., "pwd": ..}`. This is an encoding, not
//! encryption: anyone with access to the storage can read the password.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{KeyStore, SessionError, StorageArea};

/// Durable storage key of the remembered credential.
pub const REMEMBERED_CREDENTIAL_KEY: &str = "uke100_pwd";

/// An account/password pair the user asked the login form to remember.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedCredential {
    pub account: String,
    #[serde(rename = "pwd")]
    pub password: String,
}

impl RememberedCredential {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
        }
    }

    /// Writes `credential` to durable storage, or deletes the stored one
    /// when `None`.
    pub fn persist(keys: &KeyStore, credential: Option<&Self>) -> Result<(), SessionError> {
        let Some(credential) = credential else {
            keys.remove(StorageArea::Durable, REMEMBERED_CREDENTIAL_KEY);
            tracing::debug!("remembered credential cleared");
            return Ok(());
        };
        let json = serde_json::to_string(credential).map_err(SessionError::Encode)?;
        keys.set(
            StorageArea::Durable,
            REMEMBERED_CREDENTIAL_KEY,
            &STANDARD.encode(json),
        );
        tracing::debug!(account = %credential.account, "remembered credential stored");
        Ok(())
    }

    /// Reads the stored credential, if any.
    ///
    /// # Errors
    /// [`SessionError::CorruptEntry`] if the entry is not base64 JSON of
    /// the expected shape.
    pub fn load(keys: &KeyStore) -> Result<Option<Self>, SessionError> {
        let Some(encoded) = keys.get(StorageArea::Durable, REMEMBERED_CREDENTIAL_KEY) else {
            return Ok(None);
        };
        if encoded.is_empty() {
            return Ok(None);
        }
        let corrupt = |reason: String| SessionError::CorruptEntry {
            key: REMEMBERED_CREDENTIAL_KEY,
            reason,
        };
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| corrupt(e.to_string()))?;
        let credential = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        Ok(Some(credential))
    }
}

impl std::fmt::Debug for RememberedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RememberedCredential")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}
