//! # Gatehouse
//!
//! Client-side session and authentication layer.
//!
//! Gatehouse signs a user in with an RSA-encrypted credential exchange,
//! keeps the session in storage shared by every tab of the client,
//! notices when another tab replaces the session, wraps every HTTP call
//! with auth headers and uniform error handling, and opens the
//! authenticated realtime channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gatehouse::prelude::*;
//!
//! # async fn run() -> Result<(), GatehouseError> {
//! let auth = AuthService::builder()
//!     .base_url("https://portal.example.com")
//!     .build()?;
//!
//! auth.on_token_change(|change| {
//!     eprintln!("signed in elsewhere as a different account: {}", change.new);
//! });
//!
//! let outcome = auth
//!     .login(LoginForm::new("302", "s3cret").remember(true), ClientType::Web)
//!     .await?;
//! auth.commit_session(&outcome.grant);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | crate | concern |
//! |---|---|
//! | `gatehouse-protocol` | wire types and the JSON codec |
//! | `gatehouse-session` | storage, session store, token collision detection |
//! | `gatehouse-http` | authenticated requests, error normalization, interceptors |
//! | `gatehouse-cipher` | RSA credential encryption |
//! | `gatehouse-transport` | realtime WebSocket channel |

pub mod endpoints;
mod config;
mod error;
mod service;

pub use config::{AuthConfig, ClientType};
pub use error::GatehouseError;
pub use service::{
    AuthService, AuthServiceBuilder, LoginForm, LoginOutcome, PasswordChange, Registration,
};

pub use gatehouse_cipher as cipher;
pub use gatehouse_http as http;
pub use gatehouse_protocol as protocol;
pub use gatehouse_session as session;
pub use gatehouse_transport as transport;

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{
        AuthConfig, AuthService, AuthServiceBuilder, ClientType, GatehouseError, LoginForm,
        LoginOutcome, PasswordChange, Registration,
    };
    pub use gatehouse_cipher::Credentials;
    pub use gatehouse_http::{
        DeviceInfo, Interceptor, RequestError, RequestErrorKind, RequestOptions, Subscription,
    };
    pub use gatehouse_session::{
        KeyStore, MemoryStorage, PermissionLevel, RememberedCredential, Session, SessionGrant,
        Storage, TokenChange,
    };
    pub use gatehouse_transport::{ChannelState, RealtimeChannel, RealtimeConfig};
}
