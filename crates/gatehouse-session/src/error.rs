//! Error types for the session layer.

/// Errors that can occur while reading persisted session data.
///
/// Session reads themselves never fail (missing or unreadable entries
/// fall back to defaults); only entries with a strict encoding, like
/// the remembered credential, surface errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A stored entry exists but cannot be decoded.
    #[error("stored entry {key:?} is corrupt: {reason}")]
    CorruptEntry {
        /// The storage key that was read.
        key: &'static str,
        /// What went wrong while decoding it.
        reason: String,
    },

    /// Serializing a value for storage failed.
    #[error("failed to encode stored entry: {0}")]
    Encode(#[source] serde_json::Error),
}
