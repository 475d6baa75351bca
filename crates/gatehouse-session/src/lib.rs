//! Session state for Gatehouse.
//!
//! This crate owns everything the client remembers between requests:
//!
//! 1. **Storage** — a string key-value capability with a durable and a
//!    session-scoped area ([`KeyStore`], [`Storage`])
//! 2. **Session tracking** — the token / user / permission triple and
//!    cross-tab token collision detection ([`SessionStore`])
//! 3. **Remembered credentials** — the optional login-form prefill
//!    ([`RememberedCredential`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Auth service (above)  ← writes sessions on login, clears on logout
//!     ↕
//! Session layer (this crate)  ← token, user, permission level
//!     ↕
//! HTTP client / realtime channel (beside)  ← read the bearer token
//! ```

mod error;
mod remembered;
mod session;
mod storage;
mod store;

pub use error::SessionError;
pub use remembered::{RememberedCredential, REMEMBERED_CREDENTIAL_KEY};
pub use session::{PermissionLevel, Session, SessionGrant};
pub use storage::{KeyStore, MemoryStorage, Storage, StorageArea};
pub use store::{
    ExportedToken, ListenerId, SessionStore, TokenChange, PERMISSION_KEY,
    TOKEN_KEY, USER_KEY,
};
