use gatehouse_http::RequestError;

/// Errors from fetching key material or encrypting with it.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// The public-key request failed.
    #[error(transparent)]
    Fetch(#[from] RequestError),

    /// The server's key is not an RSA public key in any accepted form.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// RSA rejected the plaintext (usually: too long for the key size).
    #[error("encryption failed: {0}")]
    Encrypt(#[source] rsa::Error),
}
