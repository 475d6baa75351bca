//! Request header construction.
//!
//! Header maps are `BTreeMap<String, String>` so they are deterministic
//! and easy to assert on; the client converts them to a `HeaderMap` at
//! the last moment.

use std::collections::BTreeMap;

use crate::DeviceInfo;

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_DEVICE: &str = "Device";
pub const HEADER_VERNUM: &str = "Vernum";
pub const HEADER_LANGUAGE: &str = "Language";
pub const HEADER_SYSMARK: &str = "Sysmark";
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Path fragments of endpoints that must be called without a token:
/// the token does not exist yet when they are called.
const UNAUTHENTICATED_FRAGMENTS: [&str; 2] = ["login", "account/getpublickey"];

/// Returns `true` if `path` is a login or public-key endpoint.
pub fn is_unauthenticated_path(path: &str) -> bool {
    UNAUTHENTICATED_FRAGMENTS
        .iter()
        .any(|fragment| path.contains(fragment))
}

/// `Device`, `Vernum`, `Language` and `Sysmark`.
pub(crate) fn device_headers(device: &DeviceInfo, locale: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (HEADER_DEVICE.to_owned(), device.device.clone()),
        (HEADER_VERNUM.to_owned(), device.app_version.clone()),
        (HEADER_LANGUAGE.to_owned(), locale.to_owned()),
        (HEADER_SYSMARK.to_owned(), device.system_mark.clone()),
    ])
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Inserts `key`, replacing any existing entry whose name matches
/// case-insensitively (HTTP header names are case-insensitive).
pub(crate) fn insert_header(headers: &mut BTreeMap<String, String>, key: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
    headers.insert(key.to_owned(), value.to_owned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_and_public_key_paths_are_unauthenticated() {
        assert!(is_unauthenticated_path("/api/account/login"));
        assert!(is_unauthenticated_path("api/xwlogin/crmLogin"));
        assert!(is_unauthenticated_path("/api/account/getpublickey"));
    }

    #[test]
    fn test_other_paths_are_authenticated() {
        assert!(!is_unauthenticated_path("/api/account/pwd"));
        assert!(!is_unauthenticated_path("/api/account/modifyphoto"));
        assert!(!is_unauthenticated_path("/api/publickey"));
    }

    #[test]
    fn test_device_headers_contents() {
        let device = DeviceInfo::default().with_system_mark("linux x86_64, test");
        let headers = device_headers(&device, "zh_CN");
        assert_eq!(headers[HEADER_DEVICE], "WEB");
        assert_eq!(headers[HEADER_VERNUM], "1.0.0");
        assert_eq!(headers[HEADER_LANGUAGE], "zh_CN");
        assert_eq!(headers[HEADER_SYSMARK], "linux x86_64, test");
        assert!(!headers.contains_key(HEADER_AUTHORIZATION));
    }

    #[test]
    fn test_insert_header_replaces_case_insensitively() {
        let mut headers = BTreeMap::new();
        insert_header(&mut headers, HEADER_CONTENT_TYPE, "application/json");
        insert_header(&mut headers, "content-type", "text/plain");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["content-type"], "text/plain");
    }
}
