//! Realtime endpoint configuration.

use std::time::Duration;

use url::Url;

use crate::RealtimeError;

/// Endpoint used when the page is served from a local debug host.
pub const DEBUG_ENDPOINT: &str = "ws://10.187.134.10:732/ws/wechat";

/// Path of the messaging socket on the page's own host.
pub const REALTIME_PATH: &str = "/ws/wechat";

/// Where and how to open the realtime channel.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Origin of the page the client runs under, e.g.
    /// `https://portal.example.com`. Required unless
    /// [`endpoint`](Self::endpoint) is set.
    pub page_origin: Option<String>,
    /// `host:port` values that redirect to [`debug_endpoint`](Self::debug_endpoint).
    pub local_debug_hosts: Vec<String>,
    pub debug_endpoint: String,
    pub path: String,
    /// Explicit endpoint; bypasses origin-based resolution.
    pub endpoint: Option<String>,
    /// Upper bound on TCP + TLS + WebSocket upgrade.
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            page_origin: None,
            local_debug_hosts: vec!["localhost:8000".to_string()],
            debug_endpoint: DEBUG_ENDPOINT.to_string(),
            path: REALTIME_PATH.to_string(),
            endpoint: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl RealtimeConfig {
    /// Config resolving against the given page origin.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            page_origin: Some(origin.into()),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_local_debug_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_debug_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves the WebSocket URL to connect to.
    ///
    /// 1. an explicit endpoint wins
    /// 2. a local debug host maps to the debug endpoint
    /// 3. otherwise `ws://` for an `http` page, `wss://` for anything
    ///    else, on the page's `host[:port]` with [`path`](Self::path)
    pub fn resolve_endpoint(&self) -> Result<String, RealtimeError> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }
        let origin = self
            .page_origin
            .as_deref()
            .ok_or_else(|| RealtimeError::Endpoint("no page origin configured".into()))?;
        let url = Url::parse(origin)
            .map_err(|e| RealtimeError::Endpoint(format!("invalid page origin {origin:?}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| RealtimeError::Endpoint(format!("page origin {origin:?} has no host")))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };

        if self.local_debug_hosts.iter().any(|h| *h == authority) {
            return Ok(self.debug_endpoint.clone());
        }
        let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        Ok(format!("{scheme}://{authority}{}", self.path))
    }
}
