//! Core wire types.
//!
//! Every structure here is serialized exactly as the backend expects it.
//! Field names are lowercase run-together words (`accountpwd`,
//! `rsapublickey`) because that is what the server emits and accepts;
//! renaming any of them breaks compatibility with existing deployments.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `encrypttype` value telling the server the password field is an RSA
/// ciphertext of `"{timestamp}_{password}"` (0 would mean plaintext).
pub const ENCRYPT_TYPE_RSA: u8 = 1;

/// `Cmd` value of the realtime authentication handshake.
pub const HANDSHAKE_CMD: u8 = 1;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// An application error code returned by the server in `error_code`.
///
/// The server is not consistent about the JSON type (numbers on some
/// endpoints, strings on others), so the code is kept as its textual
/// form: `1001` and `"1001"` both become `ErrorCode("1001")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode(String);

impl ErrorCode {
    /// Creates an error code from its textual form.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interprets a raw `error_code` value.
    ///
    /// Returns `None` for values that mean "no error": `null`, `false`,
    /// `0` and the empty string. Any other value is an error code; note
    /// that the string `"0"` is a code, not success.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(Self::new("true")),
            Value::Number(n) => {
                if n.as_f64() == Some(0.0) {
                    None
                } else {
                    Some(Self::new(n.to_string()))
                }
            }
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(Self::new(s.clone())),
            other => Some(Self::new(other.to_string())),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for ErrorCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ---------------------------------------------------------------------------
// ApiEnvelope
// ---------------------------------------------------------------------------

/// The response body of every HTTP endpoint.
///
/// ```text
/// { "data": <payload>, "error_code": <code>?, "error_msg": <string>? }
/// ```
///
/// A missing `data` decodes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope {
    /// The endpoint's payload.
    #[serde(default)]
    pub data: Value,

    /// Application error code; absent or falsy on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<Value>,

    /// Human-readable error message accompanying `error_code`. Non-string
    /// values are kept as their JSON text.
    #[serde(
        default,
        deserialize_with = "lenient_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_msg: Option<String>,
}

impl ApiEnvelope {
    /// Wraps a successful payload.
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            error_code: None,
            error_msg: None,
        }
    }

    /// Returns the application error code, if this envelope carries one.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code.as_ref().and_then(ErrorCode::from_value)
    }
}

// ---------------------------------------------------------------------------
// Credential exchange
// ---------------------------------------------------------------------------

/// Payload of `POST /api/account/getpublickey`.
///
/// The timestamp is unix seconds and is valid for about one minute; the
/// server rejects ciphertexts whose embedded timestamp is outside that
/// window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyMaterial {
    /// The RSA public key (PEM or bare base64 DER).
    #[serde(rename = "rsapublickey")]
    pub public_key: String,

    /// Server time the key material was issued at.
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub timestamp: i64,
}

/// Body of `POST /api/account/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub accountname: String,
    /// RSA ciphertext of `"{timestamp}_{password}"`, base64 encoded.
    pub accountpwd: String,
    pub encrypttype: u8,
}

impl LoginRequest {
    /// Builds a login body carrying an already-encrypted password.
    pub fn encrypted(account: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        Self {
            accountname: account.into(),
            accountpwd: ciphertext.into(),
            encrypttype: ENCRYPT_TYPE_RSA,
        }
    }
}

/// Payload returned by a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginPayload {
    /// The account's user number; becomes the session's user record.
    #[serde(default)]
    pub usernumber: Value,

    /// Bearer token for subsequent requests.
    pub access_token: String,

    /// Two-character access-type code, e.g. `"00"` or `"13"`.
    #[serde(default)]
    pub accesstype: Option<String>,

    /// Opaque security settings, passed through to the caller.
    #[serde(default)]
    pub security: Option<Value>,
}

// ---------------------------------------------------------------------------
// Realtime handshake
// ---------------------------------------------------------------------------

/// Inner object of the handshake frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeData {
    pub userid: Value,
    /// `"Bearer <token>"`.
    pub authorizedcode: String,
}

/// The first frame sent on a freshly opened realtime connection.
///
/// ```text
/// {"Cmd":1,"data":{"userid":<id>,"authorizedcode":"Bearer <token>"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeFrame {
    #[serde(rename = "Cmd")]
    pub cmd: u8,
    pub data: HandshakeData,
}

impl HandshakeFrame {
    /// Builds the authentication handshake for `userid`.
    ///
    /// A missing token still produces a frame (`"Bearer "`); the server
    /// is the one that decides to reject it.
    pub fn authenticate(userid: impl Into<Value>, token: Option<&str>) -> Self {
        Self {
            cmd: HANDSHAKE_CMD,
            data: HandshakeData {
                userid: userid.into(),
                authorizedcode: format!("Bearer {}", token.unwrap_or_default()),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("timestamp is not numeric: {s:?}"))),
        other => Err(de::Error::custom(format!(
            "expected timestamp number, got {other}"
        ))),
    }
}

fn lenient_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

// =========================================================================
// Tests
// =========================================================================
