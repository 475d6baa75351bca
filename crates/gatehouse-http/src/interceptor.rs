//! Request/response observation hooks.
//!
//! Interceptors see every request the client issues and every response
//! (or transport failure) it receives. They observe; they cannot modify
//! or cancel anything.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::RequestError;

/// A request about to be sent.
#[derive(Debug)]
pub struct RequestEvent<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    pub headers: &'a BTreeMap<String, String>,
}

/// A received 2xx response, before the envelope is inspected.
///
/// Application errors (`error_code` set) still arrive here as responses;
/// only transport-level failures arrive as `Err`.
#[derive(Debug)]
pub struct ResponseEvent<'a> {
    pub status: u16,
    pub url: &'a Url,
    pub body: &'a Value,
}

type RequestHook = Arc<dyn Fn(&RequestEvent<'_>) + Send + Sync>;
type ResponseHook = Arc<dyn Fn(Result<&ResponseEvent<'_>, &RequestError>) + Send + Sync>;

/// A pair of optional hooks installed with
/// [`HttpClient::subscribe`](crate::HttpClient::subscribe).
#[derive(Clone, Default)]
pub struct Interceptor {
    on_request: Option<RequestHook>,
    on_response: Option<ResponseHook>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called before every request is sent.
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestEvent<'_>) + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(hook));
        self
    }

    /// Called after every response or transport failure.
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(Result<&ResponseEvent<'_>, &RequestError>) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct InterceptorRegistry {
    entries: Mutex<Vec<(u64, Interceptor)>>,
    next_id: AtomicU64,
}

impl InterceptorRegistry {
    pub(crate) fn add(self: &Arc<Self>, interceptor: Interceptor) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, interceptor));
        Subscription {
            id,
            registry: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    fn remove(&self, id: u64) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }

    /// Hooks are cloned out of the lock so a hook may subscribe or
    /// unsubscribe without deadlocking.
    fn snapshot(&self) -> Vec<Interceptor> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, interceptor)| interceptor.clone())
            .collect()
    }

    pub(crate) fn notify_request(&self, event: &RequestEvent<'_>) {
        for interceptor in self.snapshot() {
            if let Some(hook) = &interceptor.on_request {
                hook(event);
            }
        }
    }

    pub(crate) fn notify_response(&self, outcome: Result<&ResponseEvent<'_>, &RequestError>) {
        for interceptor in self.snapshot() {
            if let Some(hook) = &interceptor.on_response {
                hook(outcome);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle for an installed [`Interceptor`].
///
/// Dropping the handle does NOT uninstall the interceptor; call
/// [`unsubscribe`](Self::unsubscribe).
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<InterceptorRegistry>,
    active: AtomicBool,
}

impl Subscription {
    /// Uninstalls the interceptor. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    /// Whether the interceptor is still installed.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
