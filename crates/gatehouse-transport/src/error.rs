use gatehouse_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

/// What the user sees when the channel cannot be opened. The cause is
/// logged and kept in [`RealtimeError::Connect`].
pub const CONNECT_ERROR_MESSAGE: &str = "failed to connect to the realtime service";

/// Errors that can occur on the realtime channel.
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// The connection failed before the channel opened (refused, TLS,
    /// timeout, or the handshake frame could not be sent).
    #[error("{}", CONNECT_ERROR_MESSAGE)]
    Connect {
        /// Diagnostic detail; not meant for display.
        reason: String,
    },

    /// No endpoint could be derived from the configuration.
    #[error("cannot resolve realtime endpoint: {0}")]
    Endpoint(String),

    /// A channel is already open; close it before connecting again.
    #[error("realtime channel already open")]
    AlreadyOpen,

    /// Another connect is in progress.
    #[error("realtime channel is already connecting")]
    AlreadyConnecting,

    /// The channel is closed or failed.
    #[error("realtime channel closed")]
    Closed,

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),

    /// A message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl RealtimeError {
    pub(crate) fn connect(reason: impl Into<String>) -> Self {
        Self::Connect {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_displays_fixed_message() {
        let err = RealtimeError::connect("Connection refused (os error 111)");
        assert_eq!(err.to_string(), CONNECT_ERROR_MESSAGE);
        assert!(format!("{err:?}").contains("os error 111"));
    }
}
