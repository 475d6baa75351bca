//! `AuthService` builder and account operations.
//!
//! This is the entry point for an application using Gatehouse. It ties
//! the layers together: key store → session store → HTTP client →
//! credential cipher → realtime connector.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use gatehouse_cipher::{CredentialCipher, Credentials};
use gatehouse_http::{DeviceInfo, HttpClient, HttpConfig, RequestOptions};
use gatehouse_protocol::{Codec, JsonCodec, LoginPayload, LoginRequest, ENCRYPT_TYPE_RSA};
use gatehouse_session::{
    KeyStore, ListenerId, PermissionLevel, RememberedCredential, Session, SessionGrant,
    SessionStore, TokenChange,
};
use gatehouse_transport::{RealtimeChannel, RealtimeConfig, RealtimeConnector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::endpoints::{
    APP_DOWNLOAD_PATH, AVATAR_PATH, LOGIN_PATH, PASSWORD_PATH, REGISTER_PATH, SSO_LOGIN_PATH,
};
use crate::{AuthConfig, ClientType, GatehouseError};

/// Pages no account may open from this client.
const DENIED_PAGES: [&str; 1] = ["attendance"];

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// What the user typed into the login form.
#[derive(Clone)]
pub struct LoginForm {
    pub account: String,
    pub password: String,
    /// Store the pair for prefilling the form next time.
    pub remember: bool,
}

impl LoginForm {
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            remember: false,
        }
    }

    pub fn remember(mut self, remember: bool) -> Self {
        self.remember = remember;
        self
    }
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .field("remember", &self.remember)
            .finish()
    }
}

/// Result of a successful [`AuthService::login`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    /// The session the server granted.
    pub grant: SessionGrant,
    /// Security settings returned by the server, passed through.
    pub security: Option<Value>,
    /// Whether the grant was already written to the session store.
    pub persisted: bool,
}

/// A password change request. `extra` carries any further fields the
/// endpoint expects (account id, user id) and is sent as-is.
#[derive(Clone, Default)]
pub struct PasswordChange {
    pub new_password: String,
    pub old_password: String,
    pub extra: Map<String, Value>,
}

impl PasswordChange {
    pub fn new(new_password: impl Into<String>, old_password: impl Into<String>) -> Self {
        Self {
            new_password: new_password.into(),
            old_password: old_password.into(),
            extra: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordChange")
            .field("extra", &self.extra)
            .finish_non_exhaustive()
    }
}

/// A new account. `fields` holds the profile (name, phone, department,
/// access type) and is sent as-is next to the encrypted password.
#[derive(Clone, Default)]
pub struct Registration {
    pub password: String,
    pub fields: Map<String, Value>,
}

impl Registration {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring an [`AuthService`].
///
/// # Example
///
/// ```rust,no_run
/// use gatehouse::prelude::*;
///
/// # async fn run() -> Result<(), GatehouseError> {
/// let auth = AuthService::builder()
///     .base_url("https://portal.example.com")
///     .realtime(RealtimeConfig::for_origin("https://portal.example.com"))
///     .build()?;
///
/// let outcome = auth
///     .login(LoginForm::new("302", "s3cret"), ClientType::Mobile)
///     .await?;
/// assert!(outcome.persisted);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct AuthServiceBuilder {
    http: HttpConfig,
    keys: Option<KeyStore>,
    realtime: RealtimeConfig,
    auth: AuthConfig,
}

impl AuthServiceBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the origin every request path is joined to.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http.base_url = base_url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    /// Sets the device metadata sent with every request.
    pub fn device(mut self, device: DeviceInfo) -> Self {
        self.http.device = device;
        self
    }

    /// Sets the storage backing the session. Defaults to in-memory.
    pub fn key_store(mut self, keys: KeyStore) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the realtime channel configuration.
    pub fn realtime(mut self, config: RealtimeConfig) -> Self {
        self.realtime = config;
        self
    }

    /// Sets the auth behavior.
    pub fn auth_config(mut self, config: AuthConfig) -> Self {
        self.auth = config;
        self
    }

    /// Builds the service.
    pub fn build(self) -> Result<AuthService, GatehouseError> {
        let keys = self.keys.unwrap_or_else(KeyStore::in_memory);
        let session = Arc::new(SessionStore::new(keys));
        let http = HttpClient::new(self.http, Arc::clone(&session))?;
        let cipher = CredentialCipher::new(http.clone());
        let realtime = RealtimeConnector::new(self.realtime, Arc::clone(&session));

        tracing::debug!(config = ?self.auth, "auth service built");

        Ok(AuthService {
            config: self.auth,
            session,
            http,
            cipher,
            realtime,
            codec: JsonCodec,
        })
    }
}

// ---------------------------------------------------------------------------
// AuthService
// ---------------------------------------------------------------------------

/// Account operations over one client's session.
pub struct AuthService {
    config: AuthConfig,
    session: Arc<SessionStore>,
    http: HttpClient,
    cipher: CredentialCipher<HttpClient>,
    realtime: RealtimeConnector,
    codec: JsonCodec,
}

impl AuthService {
    /// Creates a new builder.
    pub fn builder() -> AuthServiceBuilder {
        AuthServiceBuilder::new()
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The HTTP client, for endpoints Gatehouse does not wrap and for
    /// installing interceptors.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn cipher(&self) -> &CredentialCipher<HttpClient> {
        &self.cipher
    }

    pub fn realtime(&self) -> &RealtimeConnector {
        &self.realtime
    }

    // -- Session ----------------------------------------------------------

    /// Signs in.
    ///
    /// Encrypts the password under a fresh key, posts the login, and
    /// maps the reply into a [`SessionGrant`]. The remembered credential
    /// is written or cleared according to `form.remember`. The grant is
    /// persisted only when `client` is in
    /// [`AuthConfig::persist_on_login`]; otherwise call
    /// [`commit_session`](Self::commit_session) once the flow allows it.
    ///
    /// # Errors
    /// Key fetch, encryption and login failures propagate. Nothing is
    /// persisted on failure.
    pub async fn login(
        &self,
        form: LoginForm,
        client: ClientType,
    ) -> Result<LoginOutcome, GatehouseError> {
        let ciphertext = self.cipher.encrypt_one(&form.password).await?;
        let request = LoginRequest::encrypted(form.account.as_str(), ciphertext);
        let payload: LoginPayload = self.post(LOGIN_PATH, &request, BTreeMap::new()).await?;

        let permission_level =
            PermissionLevel::from_access_type(payload.accesstype.as_deref().unwrap_or_default());
        let grant = SessionGrant {
            token: payload.access_token,
            user: json!({ "userNumber": payload.usernumber }),
            permission_level,
        };

        let remembered = form
            .remember
            .then(|| RememberedCredential::new(form.account.as_str(), form.password.as_str()));
        RememberedCredential::persist(self.session.keys(), remembered.as_ref())?;

        let persisted = self.config.persists(client);
        if persisted {
            self.session.set_session(&grant);
        }
        tracing::info!(account = %form.account, ?client, %permission_level, persisted, "login succeeded");

        Ok(LoginOutcome {
            grant,
            security: payload.security,
            persisted,
        })
    }

    /// Persists a grant returned by a login that was not persisted
    /// right away.
    pub fn commit_session(&self, grant: &SessionGrant) {
        self.session.set_session(grant);
    }

    /// Signs out locally: removes the session entries. No server call.
    pub fn logout(&self) {
        self.session.clear_session();
    }

    /// The session visible to this client. Fires token-change listeners
    /// if another client replaced the token.
    pub fn session(&self) -> Session {
        self.session.get_session()
    }

    /// See [`SessionStore::on_token_change`].
    pub fn on_token_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TokenChange) + Send + Sync + 'static,
    {
        self.session.on_token_change(listener)
    }

    pub fn remove_token_listener(&self, id: ListenerId) -> bool {
        self.session.remove_token_listener(id)
    }

    // -- Remembered credential --------------------------------------------

    /// The stored login-form prefill, if any.
    pub fn remembered_credential(&self) -> Result<Option<RememberedCredential>, GatehouseError> {
        Ok(RememberedCredential::load(self.session.keys())?)
    }

    /// Stores the login-form prefill, or deletes it when `None`.
    pub fn set_remembered_credential(
        &self,
        credential: Option<&RememberedCredential>,
    ) -> Result<(), GatehouseError> {
        Ok(RememberedCredential::persist(self.session.keys(), credential)?)
    }

    // -- Account ----------------------------------------------------------

    /// Changes the password. Both passwords are encrypted under one key.
    ///
    /// `headers` are sent on top of the defaults, e.g. to authorize with
    /// a temporary token during a forced change at first login.
    pub async fn change_password(
        &self,
        change: PasswordChange,
        headers: BTreeMap<String, String>,
    ) -> Result<Value, GatehouseError> {
        let (new, old) = self
            .cipher
            .encrypt_pair(&change.new_password, &change.old_password)
            .await?;
        let mut body = change.extra;
        body.insert("accountpwd".into(), Value::String(new));
        body.insert("orginpwd".into(), Value::String(old));
        body.insert("encrypttype".into(), json!(ENCRYPT_TYPE_RSA));

        let data = self.post(PASSWORD_PATH, &Value::Object(body), headers).await?;
        tracing::info!("password changed");
        Ok(data)
    }

    /// Creates an account.
    pub async fn register_user(&self, registration: Registration) -> Result<Value, GatehouseError> {
        let password = self.cipher.encrypt_one(&registration.password).await?;
        let mut body = registration.fields;
        body.insert("accountpwd".into(), Value::String(password));
        body.insert("encrypttype".into(), json!(ENCRYPT_TYPE_RSA));

        self.post(REGISTER_PATH, &Value::Object(body), BTreeMap::new())
            .await
    }

    /// Sets the avatar to a previously uploaded file.
    pub async fn modify_avatar(&self, file_id: &str) -> Result<Value, GatehouseError> {
        self.post(AVATAR_PATH, &json!({ "usericon": file_id }), BTreeMap::new())
            .await
    }

    /// Where the mobile app can be downloaded.
    pub async fn app_download_url(&self) -> Result<Value, GatehouseError> {
        Ok(self.http.get(APP_DOWNLOAD_PATH).await?)
    }

    /// Signs on through the reporting platform bridge. `params` carries
    /// the platform's signature, mobile number and timestamp.
    pub async fn sso_login(&self, params: &Value) -> Result<Value, GatehouseError> {
        self.post(SSO_LOGIN_PATH, params, BTreeMap::new()).await
    }

    /// Whether the signed-in account may open `page_id`. Decided
    /// locally; no server call.
    pub fn check_page_permission(&self, page_id: &str) -> bool {
        !DENIED_PAGES.contains(&page_id)
    }

    // -- Cipher -----------------------------------------------------------

    /// Fetches and caches a key for [`encrypt_password_sync`](Self::encrypt_password_sync).
    pub async fn init_public_key(&self) -> Result<(), GatehouseError> {
        Ok(self.cipher.init_public_key().await?)
    }

    /// See [`CredentialCipher::encrypt_sync`]: passes plaintext through
    /// when no key is cached.
    pub fn encrypt_password_sync(
        &self,
        credentials: Credentials,
    ) -> Result<Credentials, GatehouseError> {
        Ok(self.cipher.encrypt_sync(credentials)?)
    }

    // -- Realtime ---------------------------------------------------------

    /// Opens the realtime channel as `user_id`.
    pub async fn connect_realtime(
        &self,
        user_id: impl Into<Value>,
    ) -> Result<Arc<RealtimeChannel>, GatehouseError> {
        Ok(self.realtime.connect(user_id).await?)
    }

    /// Closes the realtime channel, if one is open.
    pub async fn disconnect_realtime(&self) -> Result<(), GatehouseError> {
        Ok(self.realtime.disconnect().await?)
    }

    // -- Internals --------------------------------------------------------

    async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        headers: BTreeMap<String, String>,
    ) -> Result<T, GatehouseError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let text = self.codec.encode_text(body)?;
        let options = RequestOptions::post().body(text).headers(headers);
        Ok(self.http.request_json(path, options).await?)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("http", &self.http)
            .field("realtime", &self.realtime)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::builder().build().unwrap()
    }

    #[test]
    fn test_check_page_permission() {
        let auth = service();
        assert!(!auth.check_page_permission("attendance"));
        assert!(auth.check_page_permission("dashboard"));
        assert!(auth.check_page_permission(""));
    }

    #[test]
    fn test_commit_then_logout() {
        let auth = service();
        let grant = SessionGrant {
            token: "t".into(),
            user: json!({ "userNumber": 3 }),
            permission_level: PermissionLevel::Web,
        };

        auth.commit_session(&grant);
        assert_eq!(auth.session(), Session::from(grant));

        auth.logout();
        assert!(!auth.session().is_authenticated());
    }

    #[test]
    fn test_encrypt_password_sync_without_key_passes_through() {
        let auth = service();
        let out = auth
            .encrypt_password_sync(Credentials::List(vec!["a".into(), "b".into()]))
            .unwrap();
        assert_eq!(out, Credentials::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_remembered_credential_round_trip() {
        let auth = service();
        let cred = RememberedCredential::new("302", "pw");

        auth.set_remembered_credential(Some(&cred)).unwrap();
        assert_eq!(auth.remembered_credential().unwrap(), Some(cred));

        auth.set_remembered_credential(None).unwrap();
        assert_eq!(auth.remembered_credential().unwrap(), None);
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let form = format!("{:?}", LoginForm::new("a", "hunter2"));
        let change = format!("{:?}", PasswordChange::new("hunter3", "hunter2"));
        let registration = format!("{:?}", Registration::new("hunter4"));
        assert!(!form.contains("hunter2"));
        assert!(!change.contains("hunter"));
        assert!(!registration.contains("hunter4"));
    }
}
