//! Realtime messaging channel for Gatehouse.
//!
//! A single authenticated WebSocket per client. Right after the socket
//! opens, the client identifies itself with
//!
//! ```text
//! {"Cmd":1,"data":{"userid":<id>,"authorizedcode":"Bearer <token>"}}
//! ```
//!
//! using the token stored in the [`SessionStore`](gatehouse_session::SessionStore)
//! at connect time. After that the channel carries opaque text frames.
//!
//! - [`RealtimeConfig`]: endpoint resolution and timeouts
//! - [`RealtimeConnector`]: connect + handshake, at most one channel
//! - [`RealtimeChannel`]: send, receive, close, watch state

mod channel;
mod config;
mod connector;
mod error;

pub use channel::{ChannelId, ChannelState, RealtimeChannel};
pub use config::{RealtimeConfig, DEBUG_ENDPOINT, REALTIME_PATH};
pub use connector::RealtimeConnector;
pub use error::{RealtimeError, CONNECT_ERROR_MESSAGE};
