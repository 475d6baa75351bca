//! HTTP client configuration.

use std::time::Duration;

/// Durable storage key holding the UI locale, sent as `Language`.
pub const LOCALE_KEY: &str = "currentLocale";

/// What the client reports about itself in every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device class, sent as `Device`.
    pub device: String,
    /// Application version, sent as `Vernum`.
    pub app_version: String,
    /// OS / runtime signature, sent as `Sysmark`.
    pub system_mark: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device: "WEB".to_string(),
            app_version: "1.0.0".to_string(),
            system_mark: default_system_mark(),
        }
    }
}

impl DeviceInfo {
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_system_mark(mut self, mark: impl Into<String>) -> Self {
        self.system_mark = mark.into();
        self
    }
}

/// `"{os} {arch}, gatehouse {version}"`, the native counterpart of a
/// browser's `"{os} {os version}, {browser} {browser version}"`.
fn default_system_mark() -> String {
    format!(
        "{} {}, gatehouse {}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        env!("CARGO_PKG_VERSION")
    )
}

/// Configuration for [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Origin (and optional path prefix) every request path is joined to.
    pub base_url: String,
    /// Upper bound on a whole request, connect through body.
    pub timeout: Duration,
    /// Device metadata headers.
    pub device: DeviceInfo,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/".to_string(),
            timeout: Duration::from_secs(30),
            device: DeviceInfo::default(),
        }
    }
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }
}
