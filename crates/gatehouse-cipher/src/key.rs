//! Public key decoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;

use crate::CipherError;

/// Parses an RSA public key in any of the forms the server hands out:
/// SPKI PEM, PKCS#1 PEM, or the base64 body of either without the PEM
/// armor.
pub fn parse_public_key(raw: &str) -> Result<RsaPublicKey, CipherError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CipherError::InvalidKey("empty key".into()));
    }

    if raw.starts_with("-----BEGIN") {
        if let Ok(key) = RsaPublicKey::from_public_key_pem(raw) {
            return Ok(key);
        }
        if let Ok(key) = RsaPublicKey::from_pkcs1_pem(raw) {
            return Ok(key);
        }
        return Err(CipherError::InvalidKey("unrecognized PEM key".into()));
    }

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD
        .decode(compact)
        .map_err(|e| CipherError::InvalidKey(format!("key is not base64: {e}")))?;
    if let Ok(key) = RsaPublicKey::from_public_key_der(&der) {
        return Ok(key);
    }
    if let Ok(key) = RsaPublicKey::from_pkcs1_der(&der) {
        return Ok(key);
    }
    Err(CipherError::InvalidKey("unrecognized DER key".into()))
}
