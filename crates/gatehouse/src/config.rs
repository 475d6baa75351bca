//! Auth service configuration.

use std::collections::HashSet;

/// Which kind of client is signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    /// Browser flow. Usually shows a confirmation step (security
    /// notice, forced password change) before the session is committed.
    Web,
    /// Mobile flow. The session is usable right away.
    Mobile,
}

/// Behavior of [`AuthService`](crate::AuthService).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client types whose successful login is persisted immediately.
    /// Other flows call [`commit_session`](crate::AuthService::commit_session)
    /// themselves.
    pub persist_on_login: HashSet<ClientType>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            persist_on_login: HashSet::from([ClientType::Mobile]),
        }
    }
}

impl AuthConfig {
    /// Persists on login for exactly the given client types.
    pub fn persist_on_login(mut self, types: impl IntoIterator<Item = ClientType>) -> Self {
        self.persist_on_login = types.into_iter().collect();
        self
    }

    pub fn persists(&self, client: ClientType) -> bool {
        self.persist_on_login.contains(&client)
    }
}
