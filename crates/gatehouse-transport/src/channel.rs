//! An open realtime channel.

use std::fmt;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gatehouse_protocol::{Codec, JsonCodec};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::RealtimeError;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Inbound = Result<String, tungstenite::Error>;

/// Opaque identifier for a channel, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chan-{}", self.0)
    }
}

/// Lifecycle of a realtime channel.
///
/// ```text
/// Idle ──▶ Connecting ──▶ Open ──▶ Closed
///               │          │
///               └──────────┴──▶ Error
/// ```
///
/// `Closed` and `Error` are terminal. Both are reached as soon as the
/// socket reports them, whether or not anyone is calling
/// [`RealtimeChannel::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
    Error,
}

/// Handle to an authenticated WebSocket connection.
///
/// A background task owns the read half: it queues text frames for
/// [`recv`](Self::recv) and moves the state to `Closed` or `Error` the
/// moment the peer goes away. Writes go through
/// [`send_text`](Self::send_text) and may run concurrently with reads.
pub struct RealtimeChannel {
    id: ChannelId,
    endpoint: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    inbox: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    state: Arc<watch::Sender<ChannelState>>,
    reader: JoinHandle<()>,
    codec: JsonCodec,
}

impl RealtimeChannel {
    /// Wraps a socket on which the handshake has already been sent and
    /// starts its reader task.
    pub(crate) fn open(id: ChannelId, endpoint: String, ws: WsStream) -> Self {
        let (sink, stream) = ws.split();
        let (state, _) = watch::channel(ChannelState::Open);
        let state = Arc::new(state);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_frames(id, stream, inbox_tx, Arc::clone(&state)));
        Self {
            id,
            endpoint,
            sink: Mutex::new(sink),
            inbox: Mutex::new(inbox),
            state,
            reader,
            codec: JsonCodec,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver for state transitions (close, error).
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Sends a text frame.
    pub async fn send_text(&self, text: &str) -> Result<(), RealtimeError> {
        if self.state() != ChannelState::Open {
            return Err(RealtimeError::Closed);
        }
        let result = self.sink.lock().await.send(Message::text(text.to_owned())).await;
        result.map_err(|e| {
            tracing::warn!(id = %self.id, error = %e, "realtime send failed");
            advance(&self.state, ChannelState::Error);
            RealtimeError::Send(e)
        })
    }

    /// Serializes `message` as JSON and sends it as a text frame.
    pub async fn send_json<T: Serialize>(&self, message: &T) -> Result<(), RealtimeError> {
        let text = self.codec.encode_text(message)?;
        self.send_text(&text).await
    }

    /// Waits for the next text frame.
    ///
    /// Frames that arrived before the peer closed are still delivered;
    /// after that this returns `Ok(None)`. A read error is returned once.
    pub async fn recv(&self) -> Result<Option<String>, RealtimeError> {
        match self.inbox.lock().await.recv().await {
            Some(Ok(text)) => Ok(Some(text)),
            Some(Err(e)) => Err(RealtimeError::Receive(e)),
            None => Ok(None),
        }
    }

    /// Sends a close frame. Closing an already closed channel is a no-op.
    pub async fn close(&self) -> Result<(), RealtimeError> {
        if self.state() != ChannelState::Open {
            return Ok(());
        }
        let result = self.sink.lock().await.close().await;
        advance(&self.state, ChannelState::Closed);
        tracing::info!(id = %self.id, "realtime channel closed");
        result.map_err(RealtimeError::Send)
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

/// Moves to `next` unless the channel already reached a terminal state.
fn advance(state: &watch::Sender<ChannelState>, next: ChannelState) {
    state.send_if_modified(|current| {
        if matches!(*current, ChannelState::Closed | ChannelState::Error) || *current == next {
            return false;
        }
        *current = next;
        true
    });
}

async fn read_frames(
    id: ChannelId,
    mut stream: SplitStream<WsStream>,
    inbox: mpsc::UnboundedSender<Inbound>,
    state: Arc<watch::Sender<ChannelState>>,
) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let _ = inbox.send(Ok(text.as_str().to_owned()));
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(%id, ?frame, "realtime channel closed by peer");
                advance(&state, ChannelState::Closed);
                return;
            }
            None => {
                tracing::debug!(%id, "realtime stream ended");
                advance(&state, ChannelState::Closed);
                return;
            }
            Some(Ok(other)) => {
                tracing::trace!(%id, kind = frame_kind(&other), "skipping frame");
            }
            Some(Err(e)) => {
                tracing::warn!(%id, error = %e, "realtime receive failed");
                advance(&state, ChannelState::Error);
                let _ = inbox.send(Err(e));
                return;
            }
        }
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId::new(7).to_string(), "chan-7");
        assert_eq!(ChannelId::new(7).into_inner(), 7);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let (state, _) = watch::channel(ChannelState::Open);
        advance(&state, ChannelState::Error);
        advance(&state, ChannelState::Closed);
        advance(&state, ChannelState::Open);
        assert_eq!(*state.borrow(), ChannelState::Error);
    }

    #[test]
    fn test_channel_id_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ChannelId::new(1), "first");
        assert_eq!(map[&ChannelId::new(1)], "first");
    }
}
