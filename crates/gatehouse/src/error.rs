//! Unified error type for Gatehouse.

use gatehouse_cipher::CipherError;
use gatehouse_http::RequestError;
use gatehouse_protocol::ProtocolError;
use gatehouse_session::SessionError;
use gatehouse_transport::RealtimeError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl,
/// so `?` lifts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GatehouseError {
    /// An HTTP call failed (transport or application error).
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Fetching key material or encrypting with it failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// A persisted entry could not be read or written.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The realtime channel could not be opened or used.
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl GatehouseError {
    /// The underlying request error, looking through cipher fetch
    /// failures. Use it to branch on application error codes.
    pub fn request_error(&self) -> Option<&RequestError> {
        match self {
            Self::Request(e) | Self::Cipher(CipherError::Fetch(e)) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_http::TRANSPORT_ERROR_MESSAGE;

    #[test]
    fn test_from_request_error() {
        let err: GatehouseError = RequestError::transport(None).into();
        assert!(matches!(err, GatehouseError::Request(_)));
        assert_eq!(err.to_string(), TRANSPORT_ERROR_MESSAGE);
    }

    #[test]
    fn test_from_cipher_error() {
        let err: GatehouseError = CipherError::InvalidKey("short".into()).into();
        assert!(matches!(err, GatehouseError::Cipher(_)));
        assert!(err.to_string().contains("short"));
        assert!(err.request_error().is_none());
    }

    #[test]
    fn test_request_error_through_cipher_fetch() {
        let err: GatehouseError = CipherError::Fetch(RequestError::transport(None)).into();
        assert!(err.request_error().is_some());
    }

    #[test]
    fn test_from_protocol_error() {
        let err: GatehouseError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, GatehouseError::Protocol(_)));
    }

    #[test]
    fn test_from_realtime_error() {
        let err: GatehouseError = RealtimeError::AlreadyOpen.into();
        assert!(matches!(err, GatehouseError::Realtime(_)));
    }
}
