//! Session types: what the client knows about the signed-in account.
//!
//! A session tracks:
//! - WHO is signed in (an opaque user record)
//! - HOW requests prove it (the bearer token)
//! - WHERE the account may be used (the permission level)

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// PermissionLevel
// ---------------------------------------------------------------------------

/// Coarse capability tier derived from an account's access-type code.
///
/// Stored and transmitted as its integer value (0–3).
///
/// | code       | meaning                      | level |
/// |------------|------------------------------|-------|
/// | `00`, `11` | unrestricted / web + admin   | 3     |
/// | `10`, `12` | admin only / mobile + admin  | 2     |
/// | `01`, `13` | web only / mobile + web      | 1     |
/// | other      | no login rights              | 0     |
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum PermissionLevel {
    /// No login rights.
    None = 0,
    /// Web surface only.
    Web = 1,
    /// Admin console only.
    Admin = 2,
    /// Every surface.
    Full = 3,
}

impl PermissionLevel {
    /// Maps a two-character access-type code to a level.
    ///
    /// The table is fixed by the backend; unknown codes (including
    /// `02`, "mobile only") map to [`PermissionLevel::None`].
    pub fn from_access_type(code: &str) -> Self {
        match code {
            "00" | "11" => Self::Full,
            "10" | "12" => Self::Admin,
            "01" | "13" => Self::Web,
            _ => Self::None,
        }
    }

    /// Converts a stored integer back into a level.
    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Web),
            2 => Some(Self::Admin),
            3 => Some(Self::Full),
            _ => None,
        }
    }

    /// Returns the integer encoding.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the web surface is usable at this level.
    pub fn allows_web(self) -> bool {
        matches!(self, Self::Web | Self::Full)
    }

    /// Whether the admin console is usable at this level.
    pub fn allows_admin(self) -> bool {
        matches!(self, Self::Admin | Self::Full)
    }
}

impl From<PermissionLevel> for u8 {
    fn from(level: PermissionLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for PermissionLevel {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_u8(level).ok_or_else(|| format!("permission level out of range: {level}"))
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Session / SessionGrant
// ---------------------------------------------------------------------------

/// The credentials issued by a successful login.
///
/// This is what gets persisted. Token and user are not optional here,
/// so a grant can never describe half a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionGrant {
    /// Bearer token for authenticated requests.
    pub token: String,
    /// Identity record of the signed-in account.
    pub user: Value,
    /// Surfaces this account may use.
    pub permission_level: PermissionLevel,
}

/// The session state visible to this tab.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Bearer token, if signed in.
    pub token: Option<String>,
    /// Identity record, if signed in.
    pub user: Option<Value>,
    /// Surfaces this account may use.
    pub permission_level: PermissionLevel,
}

impl Session {
    /// A signed-out session carrying only a permission level.
    pub fn anonymous(permission_level: PermissionLevel) -> Self {
        Self {
            token: None,
            user: None,
            permission_level,
        }
    }

    /// Returns `true` when both token and user are present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }
}

impl From<SessionGrant> for Session {
    fn from(grant: SessionGrant) -> Self {
        Self {
            token: Some(grant.token),
            user: Some(grant.user),
            permission_level: grant.permission_level,
        }
    }
}
