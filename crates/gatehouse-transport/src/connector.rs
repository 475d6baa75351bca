//! Opens the realtime channel and keeps at most one of them alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::SinkExt;
use gatehouse_protocol::{Codec, HandshakeFrame, JsonCodec};
use gatehouse_session::SessionStore;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

use crate::{ChannelId, ChannelState, RealtimeChannel, RealtimeConfig, RealtimeError};

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

enum Slot {
    Idle,
    Connecting,
    Failed,
    Active(Arc<RealtimeChannel>),
}

/// Opens authenticated realtime channels.
///
/// Holds at most one channel: connecting while the current one is
/// open fails with [`RealtimeError::AlreadyOpen`]. A channel closed by
/// either side, or failed, is replaced by the next `connect`. There is
/// no automatic reconnect; [`disconnect`](Self::disconnect) resets the
/// connector explicitly.
pub struct RealtimeConnector {
    config: RealtimeConfig,
    session: Arc<SessionStore>,
    slot: Mutex<Slot>,
    codec: JsonCodec,
}

impl RealtimeConnector {
    pub fn new(config: RealtimeConfig, session: Arc<SessionStore>) -> Self {
        Self {
            config,
            session,
            slot: Mutex::new(Slot::Idle),
            codec: JsonCodec,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State of the current (or last) channel.
    pub fn state(&self) -> ChannelState {
        match &*self.slot() {
            Slot::Idle => ChannelState::Idle,
            Slot::Connecting => ChannelState::Connecting,
            Slot::Failed => ChannelState::Error,
            Slot::Active(channel) => channel.state(),
        }
    }

    /// The current channel, if one has been opened.
    pub fn channel(&self) -> Option<Arc<RealtimeChannel>> {
        match &*self.slot() {
            Slot::Active(channel) => Some(Arc::clone(channel)),
            _ => None,
        }
    }

    /// Connects and authenticates as `user_id`.
    ///
    /// The bearer token is read from the session once, here; a token
    /// change afterwards does not affect the open channel.
    ///
    /// # Errors
    /// - [`RealtimeError::AlreadyOpen`] / [`RealtimeError::AlreadyConnecting`]
    /// - [`RealtimeError::Connect`] if the socket cannot be opened within
    ///   the connect timeout or the handshake cannot be sent
    pub async fn connect(
        &self,
        user_id: impl Into<Value>,
    ) -> Result<Arc<RealtimeChannel>, RealtimeError> {
        let mut guard = {
            let mut slot = self.slot();
            match &*slot {
                Slot::Connecting => return Err(RealtimeError::AlreadyConnecting),
                Slot::Active(channel) if channel.state() == ChannelState::Open => {
                    return Err(RealtimeError::AlreadyOpen);
                }
                _ => {}
            }
            *slot = Slot::Connecting;
            ConnectingGuard {
                connector: self,
                settled: false,
            }
        };

        let result = self.open(user_id.into()).await;
        guard.settle(match &result {
            Ok(channel) => Slot::Active(Arc::clone(channel)),
            Err(_) => Slot::Failed,
        });
        result
    }

    /// Closes the current channel, if any, and returns the connector to
    /// `Idle`.
    ///
    /// A connect in progress is left alone and reported as
    /// [`RealtimeError::AlreadyConnecting`].
    pub async fn disconnect(&self) -> Result<(), RealtimeError> {
        let current = {
            let mut slot = self.slot();
            if matches!(*slot, Slot::Connecting) {
                return Err(RealtimeError::AlreadyConnecting);
            }
            std::mem::replace(&mut *slot, Slot::Idle)
        };
        match current {
            Slot::Active(channel) => {
                tracing::debug!(id = %channel.id(), "disconnecting realtime channel");
                channel.close().await
            }
            _ => Ok(()),
        }
    }

    async fn open(&self, user_id: Value) -> Result<Arc<RealtimeChannel>, RealtimeError> {
        let endpoint = self.config.resolve_endpoint()?;
        let token = self.session.token();
        let handshake = self
            .codec
            .encode_text(&HandshakeFrame::authenticate(user_id, token.as_deref()))?;

        tracing::debug!(%endpoint, "opening realtime channel");
        let connecting = tokio_tungstenite::connect_async(endpoint.as_str());
        let mut ws = match tokio::time::timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(e)) => {
                tracing::warn!(%endpoint, error = %e, "realtime connect failed");
                return Err(RealtimeError::connect(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(%endpoint, timeout = ?self.config.connect_timeout, "realtime connect timed out");
                return Err(RealtimeError::connect("connect timed out"));
            }
        };

        if let Err(e) = ws.send(Message::text(handshake)).await {
            tracing::warn!(%endpoint, error = %e, "realtime handshake failed");
            return Err(RealtimeError::connect(e.to_string()));
        }

        let id = ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
        tracing::info!(%id, %endpoint, "realtime channel open");
        Ok(Arc::new(RealtimeChannel::open(id, endpoint, ws)))
    }
}

impl std::fmt::Debug for RealtimeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConnector")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Resets the slot if a connect is abandoned mid-flight.
struct ConnectingGuard<'a> {
    connector: &'a RealtimeConnector,
    settled: bool,
}

impl ConnectingGuard<'_> {
    fn settle(&mut self, slot: Slot) {
        *self.connector.slot() = slot;
        self.settled = true;
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.connector.slot() = Slot::Idle;
        }
    }
}
