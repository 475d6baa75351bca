//! Authenticated HTTP client for Gatehouse.
//!
//! Every call to the backend goes through [`HttpClient::request`], which:
//!
//! 1. builds device headers plus the bearer token from the
//!    [`SessionStore`](gatehouse_session::SessionStore) (except on the
//!    login and public-key endpoints),
//! 2. issues the request with a timeout,
//! 3. normalizes every failure into one [`RequestError`] shape, and
//! 4. unwraps the `data` field of the response envelope.
//!
//! Cross-cutting observers (loading indicators, global error toasts)
//! hook in with [`HttpClient::subscribe`].

mod client;
mod config;
mod error;
mod headers;
mod interceptor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{HttpClient, RequestOptions};
pub use config::{DeviceInfo, HttpConfig, LOCALE_KEY};
pub use error::{RequestError, RequestErrorKind, TRANSPORT_ERROR_MESSAGE};
pub use headers::{
    is_unauthenticated_path, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_DEVICE,
    HEADER_LANGUAGE, HEADER_SYSMARK, HEADER_VERNUM,
};
pub use interceptor::{Interceptor, RequestEvent, ResponseEvent, Subscription};
pub use reqwest::Method;
