//! The session store: persisted session state and token collision
//! detection.
//!
//! Sessions live in the durable storage area, which every tab of the
//! same origin shares. Two tabs can therefore sign in as two different
//! accounts and silently overwrite each other's token: tab A keeps
//! believing it is account X while its requests now carry account Y's
//! token. [`SessionStore`] cannot prevent that race, but it notices it.
//! Every [`SessionStore::get_session`] compares the token it just read
//! with the last one this store observed and tells the registered
//! listeners when they differ.
//!
//! ```text
//!  tab A: set_session(X) ──┐                 ┌── get_session() → sees Y
//!                          ▼                 │   last = X, now = Y
//!                   [durable storage] ◄──────┤   → listeners(X, Y)
//!                          ▲                 │
//!  tab B: set_session(Y) ──┘                 └── last = Y
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{KeyStore, PermissionLevel, Session, SessionGrant, StorageArea};

/// Durable key holding the bearer token.
pub const TOKEN_KEY: &str = "auth_access_token";
/// Durable key holding the JSON-serialized user record.
pub const USER_KEY: &str = "auth_user";
/// Durable key holding the permission level, written as `"{level} "`.
pub const PERMISSION_KEY: &str = "auth_permission_level";

/// Level reported when none is stored.
///
/// This is fail-open: a tab with no stored level is treated as having
/// every right. Deployments rely on it; tightening it to
/// [`PermissionLevel::None`] needs sign-off.
const DEFAULT_PERMISSION_LEVEL: PermissionLevel = PermissionLevel::Full;

// ---------------------------------------------------------------------------
// TokenChange / listeners
// ---------------------------------------------------------------------------

/// A detected token replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChange {
    /// The token this store observed previously.
    pub old: String,
    /// The token now present in durable storage.
    pub new: String,
}

/// Handle returned by [`SessionStore::on_token_change`], used to remove
/// the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type TokenListener = Arc<dyn Fn(&TokenChange) + Send + Sync>;

// ---------------------------------------------------------------------------
// ExportedToken
// ---------------------------------------------------------------------------

/// Read-only view of the current token for integrations that cannot go
/// through [`SessionStore`] (e.g. an editor's upload widget that needs
/// the token in its own requests).
///
/// Updated by `set_session` and `clear_session`; cloning shares it.
#[derive(Debug, Clone, Default)]
pub struct ExportedToken(Arc<RwLock<Option<String>>>);

impl ExportedToken {
    /// Returns the most recently published token.
    pub fn get(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Owns the persisted session of one tab.
///
/// Shared by the HTTP client, the realtime connector and the auth
/// service, usually behind an `Arc`.
pub struct SessionStore {
    keys: KeyStore,

    /// The token returned by the previous read (empty when none).
    last_token: Mutex<String>,

    listeners: Mutex<Vec<(ListenerId, TokenListener)>>,
    next_listener_id: AtomicU64,

    exported: ExportedToken,
}

impl SessionStore {
    /// Creates a store over `keys`. Nothing is read until the first
    /// [`get_session`](Self::get_session).
    pub fn new(keys: KeyStore) -> Self {
        Self {
            keys,
            last_token: Mutex::new(String::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            exported: ExportedToken::default(),
        }
    }

    /// The key store this session store reads and writes.
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Persists a session.
    ///
    /// Writes token, user and permission level, then publishes the token
    /// to the [`ExportedToken`] handle. The permission entry keeps its
    /// trailing space; existing deployments read it back that way.
    pub fn set_session(&self, grant: &SessionGrant) {
        self.keys.set(StorageArea::Durable, TOKEN_KEY, &grant.token);
        self.keys
            .set(StorageArea::Durable, USER_KEY, &grant.user.to_string());
        self.keys.set(
            StorageArea::Durable,
            PERMISSION_KEY,
            &format!("{} ", grant.permission_level.as_u8()),
        );
        self.exported.publish(Some(grant.token.clone()));

        tracing::info!(
            permission_level = %grant.permission_level,
            "session stored"
        );
    }

    /// Reads the session visible to this tab.
    ///
    /// Runs token collision detection on every call: if the token read
    /// now and the token read last time are both non-empty and differ,
    /// every token-change listener is invoked with `(old, new)` before
    /// this returns.
    pub fn get_session(&self) -> Session {
        let token = self
            .keys
            .get(StorageArea::Durable, TOKEN_KEY)
            .filter(|t| !t.is_empty());
        let user = self.read_user();
        let permission_level = self.read_permission_level();

        self.observe_token(token.as_deref().unwrap_or_default());

        match (token, user) {
            (Some(token), Some(user)) => Session {
                token: Some(token),
                user: Some(user),
                permission_level,
            },
            (None, None) => Session::anonymous(permission_level),
            (token, _) => {
                tracing::warn!(
                    has_token = token.is_some(),
                    "partial session in storage, treating as signed out"
                );
                Session::anonymous(permission_level)
            }
        }
    }

    /// Shorthand for `get_session().token`, with the same collision check.
    pub fn token(&self) -> Option<String> {
        self.get_session().token
    }

    /// Removes the persisted session and forgets the observed token.
    pub fn clear_session(&self) {
        self.keys.remove(StorageArea::Durable, TOKEN_KEY);
        self.keys.remove(StorageArea::Durable, USER_KEY);
        self.keys.remove(StorageArea::Durable, PERMISSION_KEY);
        self.last_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.exported.publish(None);

        tracing::info!("session cleared");
    }

    /// Registers a listener for token replacements.
    ///
    /// Listeners run synchronously inside `get_session`, on whichever
    /// task performed the read. Keep them short.
    pub fn on_token_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TokenChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_token_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The handle through which the current token is exported.
    pub fn exported_token(&self) -> ExportedToken {
        self.exported.clone()
    }

    // -- Internals --------------------------------------------------------

    fn read_user(&self) -> Option<serde_json::Value> {
        let raw = self.keys.get(StorageArea::Durable, USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "stored user record is not valid JSON");
                None
            }
        }
    }

    fn read_permission_level(&self) -> PermissionLevel {
        let Some(raw) = self.keys.get(StorageArea::Durable, PERMISSION_KEY) else {
            return DEFAULT_PERMISSION_LEVEL;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return DEFAULT_PERMISSION_LEVEL;
        }
        match trimmed.parse::<u8>().ok().and_then(PermissionLevel::from_u8) {
            Some(level) => level,
            None => {
                tracing::warn!(stored = %raw, "unreadable permission level, using default");
                DEFAULT_PERMISSION_LEVEL
            }
        }
    }

    /// Records `current` as the observed token and notifies listeners if
    /// it replaced a different non-empty token.
    ///
    /// The swap happens before notification so that a listener reading
    /// the session again does not see the same change twice.
    ///
    /// A token cleared by another tab (logout) is not reported; only a
    /// replacement by a different non-empty token is.
    fn observe_token(&self, current: &str) {
        let previous = {
            let mut last = self
                .last_token
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *last, current.to_owned())
        };

        if previous.is_empty() || current.is_empty() || previous == current {
            return;
        }

        tracing::warn!("session token replaced by another tab");
        let change = TokenChange {
            old: previous,
            new: current.to_owned(),
        };
        let listeners: Vec<TokenListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
