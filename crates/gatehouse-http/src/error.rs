//! The single error shape every HTTP caller handles.

use gatehouse_protocol::ErrorCode;
use serde_json::Value;

/// Message shown for every transport-level failure. The underlying
/// error is logged, never surfaced.
pub const TRANSPORT_ERROR_MESSAGE: &str = "failed to reach server, retry later";

/// Broad class of a [`RequestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// The server could not be reached or answered with something that
    /// is not a valid envelope (network, DNS, TLS, timeout, non-2xx).
    Transport,
    /// The server answered with a non-empty `error_code`.
    Application,
    /// The request could not be built (bad path or header value).
    Invalid,
    /// The payload did not have the shape the caller asked for.
    Decode,
}

/// A failed request.
///
/// Only [`RequestErrorKind::Application`] errors carry a [`code`](Self::code);
/// callers branch on it (e.g. invalid credentials on the login screen).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    kind: RequestErrorKind,
    message: String,
    code: Option<ErrorCode>,
    raw_response: Option<Value>,
}

impl RequestError {
    /// A transport failure with the fixed user-facing message.
    pub fn transport(raw_response: Option<Value>) -> Self {
        Self {
            kind: RequestErrorKind::Transport,
            message: TRANSPORT_ERROR_MESSAGE.to_string(),
            code: None,
            raw_response,
        }
    }

    /// An application error reported through the response envelope.
    pub fn application(code: ErrorCode, message: Option<String>, raw_response: Value) -> Self {
        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("request failed ({code})"));
        Self {
            kind: RequestErrorKind::Application,
            message,
            code: Some(code),
            raw_response: Some(raw_response),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: RequestErrorKind::Invalid,
            message: message.into(),
            code: None,
            raw_response: None,
        }
    }

    pub(crate) fn decode(message: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: RequestErrorKind::Decode,
            message: message.into(),
            code: None,
            raw_response: Some(payload),
        }
    }

    pub fn kind(&self) -> RequestErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The application error code, for [`RequestErrorKind::Application`].
    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }

    /// The full response body, when one was received and parsed.
    pub fn raw_response(&self) -> Option<&Value> {
        self.raw_response.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transport_error_has_fixed_message_and_no_code() {
        let err = RequestError::transport(None);
        assert_eq!(err.to_string(), TRANSPORT_ERROR_MESSAGE);
        assert_eq!(err.kind(), RequestErrorKind::Transport);
        assert!(err.code().is_none());
    }

    #[test]
    fn test_application_error_keeps_code_and_envelope() {
        let envelope = json!({ "data": null, "error_code": "E1", "error_msg": "bad" });
        let err = RequestError::application(
            ErrorCode::new("E1"),
            Some("bad".into()),
            envelope.clone(),
        );
        assert_eq!(err.message(), "bad");
        assert_eq!(err.code().unwrap(), &ErrorCode::new("E1"));
        assert_eq!(err.raw_response(), Some(&envelope));
    }

    #[test]
    fn test_application_error_without_message_falls_back() {
        let err = RequestError::application(ErrorCode::new("42"), None, json!({}));
        assert_eq!(err.message(), "request failed (42)");
    }
}
