//! The authenticated request pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use gatehouse_protocol::{ApiEnvelope, Codec, JsonCodec};
use gatehouse_session::{SessionStore, StorageArea};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::headers::{self, insert_header};
use crate::interceptor::InterceptorRegistry;
use crate::{
    HttpConfig, Interceptor, RequestError, RequestEvent, ResponseEvent, Subscription,
    HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, LOCALE_KEY,
};

// ---------------------------------------------------------------------------
// RequestOptions
// ---------------------------------------------------------------------------

/// Per-request options: method, pre-serialized body, header overrides.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// JSON text sent as-is.
    pub body: Option<String>,
    /// Overrides for the default headers, matched case-insensitively.
    pub headers: BTreeMap<String, String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: BTreeMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::POST,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// HTTP client that attaches device and auth headers and normalizes
/// every failure into a [`RequestError`].
///
/// Cloning is cheap and shares the connection pool, the session and the
/// installed interceptors.
#[derive(Clone)]
pub struct HttpClient {
    http: Client,
    base_url: Url,
    config: HttpConfig,
    session: Arc<SessionStore>,
    interceptors: Arc<InterceptorRegistry>,
    codec: JsonCodec,
}

impl HttpClient {
    /// Builds a client.
    ///
    /// # Errors
    /// [`RequestErrorKind::Invalid`](crate::RequestErrorKind::Invalid) if
    /// the base URL does not parse or the TLS backend fails to initialize.
    pub fn new(config: HttpConfig, session: Arc<SessionStore>) -> Result<Self, RequestError> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RequestError::invalid(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(base_url = %base_url, timeout = ?config.timeout, "http client created");

        Ok(Self {
            http,
            base_url,
            config,
            session,
            interceptors: Arc::new(InterceptorRegistry::default()),
            codec: JsonCodec,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// The session store tokens are read from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// `Device`, `Vernum`, `Language` and `Sysmark`.
    ///
    /// `Language` is the durable `currentLocale` entry, empty when unset.
    pub fn device_headers(&self) -> BTreeMap<String, String> {
        let locale = self
            .session
            .keys()
            .get(StorageArea::Durable, LOCALE_KEY)
            .unwrap_or_default();
        headers::device_headers(&self.config.device, &locale)
    }

    /// [`device_headers`](Self::device_headers) plus
    /// `Authorization: Bearer <token>` when a token is stored.
    pub fn authed_headers(&self) -> BTreeMap<String, String> {
        let mut out = self.device_headers();
        if let Some(token) = self.session.token() {
            out.insert(HEADER_AUTHORIZATION.to_owned(), headers::bearer(&token));
        }
        out
    }

    /// The full header set for a request to `path`.
    pub fn request_headers(
        &self,
        path: &str,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut out = if headers::is_unauthenticated_path(path) {
            self.device_headers()
        } else {
            self.authed_headers()
        };
        out.insert(HEADER_CONTENT_TYPE.to_owned(), "application/json".to_owned());
        for (key, value) in overrides {
            insert_header(&mut out, key, value);
        }
        out
    }

    /// Resolves `path` against the base URL. A leading `/` is ignored so
    /// a base path prefix is kept.
    pub fn url_for(&self, path: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| RequestError::invalid(format!("invalid request path {path:?}: {e}")))
    }

    /// Installs an interceptor until the returned handle is unsubscribed.
    pub fn subscribe(&self, interceptor: Interceptor) -> Subscription {
        self.interceptors.add(interceptor)
    }

    /// Issues a request and returns the envelope's `data` field.
    ///
    /// # Errors
    /// - transport failure, timeout, non-2xx status, or a body that is not
    ///   a JSON object: [`RequestErrorKind::Transport`] with the generic
    ///   message
    /// - an envelope with a non-empty `error_code`:
    ///   [`RequestErrorKind::Application`] carrying the code and envelope
    ///
    /// [`RequestErrorKind::Transport`]: crate::RequestErrorKind::Transport
    /// [`RequestErrorKind::Application`]: crate::RequestErrorKind::Application
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, RequestError> {
        let url = self.url_for(path)?;
        let headers = self.request_headers(path, &options.headers);
        let header_map = to_header_map(&headers)?;

        self.interceptors.notify_request(&RequestEvent {
            method: &options.method,
            url: &url,
            headers: &headers,
        });
        tracing::debug!(method = %options.method, url = %url, "sending request");

        let mut builder = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(header_map);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "request failed");
                return Err(self.fail(RequestError::transport(None)));
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %url, %status, error = %e, "failed to read response body");
                return Err(self.fail(RequestError::transport(None)));
            }
        };
        let body: Option<Value> = self.codec.decode(&bytes).ok();

        if !status.is_success() {
            tracing::warn!(url = %url, %status, "server returned error status");
            return Err(self.fail(RequestError::transport(body)));
        }
        let Some(body) = body.filter(Value::is_object) else {
            tracing::warn!(url = %url, %status, "response body is not a JSON object");
            return Err(self.fail(RequestError::transport(None)));
        };

        let envelope = match decode_envelope(&body) {
            Ok(envelope) => envelope,
            Err(e) => return Err(self.fail(e)),
        };

        self.interceptors.notify_response(Ok(&ResponseEvent {
            status: status.as_u16(),
            url: &url,
            body: &body,
        }));

        unwrap_envelope(envelope, body)
    }

    /// [`request`](Self::request), then deserializes the payload.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, RequestError> {
        let data = self.request(path, options).await?;
        serde_json::from_value(data.clone()).map_err(|e| {
            tracing::warn!(path, error = %e, "unexpected payload shape");
            RequestError::decode(format!("unexpected payload from {path}: {e}"), data)
        })
    }

    /// POSTs `body` serialized as JSON.
    pub async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        headers: BTreeMap<String, String>,
    ) -> Result<Value, RequestError> {
        let text = self
            .codec
            .encode_text(body)
            .map_err(|e| RequestError::invalid(format!("failed to encode request body: {e}")))?;
        self.request(path, RequestOptions::post().body(text).headers(headers))
            .await
    }

    /// GETs `path`.
    pub async fn get(&self, path: &str) -> Result<Value, RequestError> {
        self.request(path, RequestOptions::get()).await
    }

    fn fail(&self, error: RequestError) -> RequestError {
        self.interceptors.notify_response(Err(&error));
        error
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.config.timeout)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_base_url(raw: &str) -> Result<Url, RequestError> {
    let normalized = if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| RequestError::invalid(format!("invalid base URL {raw:?}: {e}")))
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, RequestError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| RequestError::invalid(format!("invalid header name: {key}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| RequestError::invalid(format!("invalid header value for {key}")))?;
        out.insert(name, value);
    }
    Ok(out)
}

fn decode_envelope(body: &Value) -> Result<ApiEnvelope, RequestError> {
    ApiEnvelope::deserialize(body).map_err(|e| {
        tracing::warn!(error = %e, "malformed response envelope");
        RequestError::transport(Some(body.clone()))
    })
}

/// Splits a decoded envelope into its payload or an application error.
fn unwrap_envelope(envelope: ApiEnvelope, body: Value) -> Result<Value, RequestError> {
    match envelope.error_code() {
        Some(code) => {
            tracing::debug!(%code, "application error");
            Err(RequestError::application(code, envelope.error_msg, body))
        }
        None => Ok(envelope.data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestErrorKind;
    use gatehouse_session::{KeyStore, PermissionLevel, SessionGrant};
    use serde_json::json;

    fn settle(body: Value) -> Result<Value, RequestError> {
        let envelope = decode_envelope(&body)?;
        unwrap_envelope(envelope, body)
    }

    fn client(base: &str) -> HttpClient {
        let session = Arc::new(SessionStore::new(KeyStore::in_memory()));
        HttpClient::new(HttpConfig::new(base), session).unwrap()
    }

    fn sign_in(client: &HttpClient, token: &str) {
        client.session().set_session(&SessionGrant {
            token: token.into(),
            user: json!({ "userNumber": 1 }),
            permission_level: PermissionLevel::Full,
        });
    }

    // =========================================================================
    // Headers
    // =========================================================================

    #[test]
    fn test_authed_headers_without_token_has_no_authorization() {
        let client = client("http://localhost:8000");
        assert!(!client.authed_headers().contains_key(HEADER_AUTHORIZATION));
    }

    #[test]
    fn test_authed_headers_with_token() {
        let client = client("http://localhost:8000");
        sign_in(&client, "abc");
        assert_eq!(client.authed_headers()[HEADER_AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn test_login_path_skips_authorization() {
        let client = client("http://localhost:8000");
        sign_in(&client, "abc");

        let login = client.request_headers("/api/account/login", &BTreeMap::new());
        let key = client.request_headers("/api/account/getpublickey", &BTreeMap::new());
        let other = client.request_headers("/api/account/pwd", &BTreeMap::new());

        assert!(!login.contains_key(HEADER_AUTHORIZATION));
        assert!(!key.contains_key(HEADER_AUTHORIZATION));
        assert_eq!(other[HEADER_AUTHORIZATION], "Bearer abc");
        assert_eq!(other[HEADER_CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_language_header_reads_locale() {
        let client = client("http://localhost:8000");
        assert_eq!(client.device_headers()[crate::HEADER_LANGUAGE], "");

        client
            .session()
            .keys()
            .set(StorageArea::Durable, LOCALE_KEY, "en_US");

        assert_eq!(client.device_headers()[crate::HEADER_LANGUAGE], "en_US");
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let client = client("http://localhost:8000");
        let overrides = BTreeMap::from([("content-type".to_owned(), "text/plain".to_owned())]);

        let headers = client.request_headers("/api/x", &overrides);

        assert_eq!(headers.get("content-type").map(String::as_str), Some("text/plain"));
        assert!(!headers.contains_key(HEADER_CONTENT_TYPE));
    }

    // =========================================================================
    // URLs
    // =========================================================================

    #[test]
    fn test_url_for_keeps_base_path_prefix() {
        let client = client("http://host:8000/gateway");
        assert_eq!(
            client.url_for("/api/account/login").unwrap().as_str(),
            "http://host:8000/gateway/api/account/login"
        );
        assert_eq!(
            client.url_for("api/xwlogin/crmLogin").unwrap().as_str(),
            "http://host:8000/gateway/api/xwlogin/crmLogin"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let session = Arc::new(SessionStore::new(KeyStore::in_memory()));
        let err = HttpClient::new(HttpConfig::new("not a url"), session).unwrap_err();
        assert_eq!(err.kind(), RequestErrorKind::Invalid);
    }

    // =========================================================================
    // Envelope
    // =========================================================================

    #[test]
    fn test_unwrap_envelope_returns_data() {
        let data = settle(json!({ "data": { "foo": 1 } })).unwrap();
        assert_eq!(data, json!({ "foo": 1 }));
    }

    #[test]
    fn test_unwrap_envelope_missing_data_is_null() {
        assert_eq!(settle(json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_unwrap_envelope_zero_code_is_success() {
        let data = settle(json!({ "data": 5, "error_code": 0 })).unwrap();
        assert_eq!(data, json!(5));
    }

    #[test]
    fn test_unwrap_envelope_error_code() {
        let body = json!({ "data": { "foo": 1 }, "error_code": "E1", "error_msg": "bad" });
        let err = settle(body.clone()).unwrap_err();

        assert_eq!(err.kind(), RequestErrorKind::Application);
        assert_eq!(err.message(), "bad");
        assert_eq!(err.code().unwrap().as_str(), "E1");
        assert_eq!(err.raw_response(), Some(&body));
    }

    #[test]
    fn test_unwrap_envelope_structured_error_msg_keeps_code() {
        let body = json!({ "error_code": 1002, "error_msg": ["locked", "retry later"] });
        let err = settle(body).unwrap_err();

        assert_eq!(err.kind(), RequestErrorKind::Application);
        assert_eq!(err.code().unwrap().as_str(), "1002");
        assert_eq!(err.message(), r#"["locked","retry later"]"#);
    }

    #[test]
    fn test_request_options_builders() {
        let options = RequestOptions::post().body("{}").header("X-Trace", "1");
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.body.as_deref(), Some("{}"));
        assert_eq!(options.headers["X-Trace"], "1");
        assert_eq!(RequestOptions::default().method, Method::GET);
    }
}
