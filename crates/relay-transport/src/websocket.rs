//! WebSocket transport over axum's `WebSocket`.
//!
//! Text messages carry one JSON event each. Binary messages carry
//! length-prefixed MessagePack and may pack several events. Outbound
//! events use whichever encoding the peer used last, JSON by default.
//!
//! Messages over [`WebSocketConfig::max_message_size`] are rejected one at
//! a time and the connection stays open. Only messages over
//! [`WebSocketConfig::hard_limit`] are refused by the socket itself.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_protocol::codec::{self, LENGTH_PREFIX_SIZE, MAX_FRAME_SIZE};
use relay_protocol::{ClientEvent, Encoding, ServerEvent};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::traits::{EventSink, EventSource, Received, TransportError};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl WebSocketConfig {
    /// Size above which the socket closes instead of rejecting the message.
    #[must_use]
    pub fn hard_limit(&self) -> usize {
        MAX_FRAME_SIZE.max(self.max_message_size)
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64 KB
        }
    }
}

/// Encoding of the most recent inbound message, shared by both halves.
#[derive(Debug, Default)]
struct PeerEncoding(AtomicU8);

impl PeerEncoding {
    fn set(&self, encoding: Encoding) {
        self.0.store(encoding as u8, Ordering::Relaxed);
    }

    fn get(&self) -> Encoding {
        if self.0.load(Ordering::Relaxed) == Encoding::MessagePack as u8 {
            Encoding::MessagePack
        } else {
            Encoding::Json
        }
    }
}

/// Split an upgraded socket into its event source and sink.
#[must_use]
pub fn split(socket: WebSocket, config: &WebSocketConfig) -> (WebSocketSource, WebSocketSink) {
    let (sink, stream) = socket.split();
    let encoding = Arc::new(PeerEncoding::default());

    let source = WebSocketSource {
        stream,
        read_buffer: BytesMut::with_capacity(4096),
        encoding: Arc::clone(&encoding),
        max_message_size: config.max_message_size,
    };
    let sink = WebSocketSink {
        sink,
        encoding,
        is_open: true,
    };

    (source, sink)
}

/// Inbound half of a WebSocket connection.
pub struct WebSocketSource {
    stream: SplitStream<WebSocket>,
    read_buffer: BytesMut,
    encoding: Arc<PeerEncoding>,
    max_message_size: usize,
}

impl WebSocketSource {
    fn check_size(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_message_size {
            warn!(
                "Message too large: {} bytes (max: {})",
                size, self.max_message_size
            );
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }
        Ok(())
    }

    /// Append a binary message to the partial-frame buffer.
    ///
    /// The buffered bytes and the frame length the prefix announces are
    /// both held to the message limit; on violation the buffer is dropped.
    fn buffer_binary(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.read_buffer.extend_from_slice(data);

        let declared =
            codec::frame_len(&self.read_buffer).map_or(0, |len| len + LENGTH_PREFIX_SIZE);
        let size = self.read_buffer.len().max(declared);
        if let Err(e) = self.check_size(size) {
            self.read_buffer.clear();
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for WebSocketSource {
    async fn recv(&mut self) -> Result<Option<Received>, TransportError> {
        // Drain events already packed into the buffer first
        if let Some(event) = codec::decode_from::<ClientEvent>(&mut self.read_buffer)? {
            return Ok(Some(Received::Event(event)));
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    self.encoding.set(Encoding::Json);
                    self.check_size(text.len())?;
                    let event = codec::decode_json::<ClientEvent>(&text)?;
                    return Ok(Some(Received::Event(event)));
                }
                Some(Ok(Message::Binary(data))) => {
                    self.encoding.set(Encoding::MessagePack);
                    self.buffer_binary(&data)?;

                    if let Some(event) = codec::decode_from::<ClientEvent>(&mut self.read_buffer)? {
                        return Ok(Some(Received::Event(event)));
                    }
                    // Need more data, continue reading
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Some(Received::Heartbeat));
                }
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                None => {
                    debug!("WebSocket stream ended");
                    return Ok(None);
                }
            }
        }
    }
}

/// Outbound half of a WebSocket connection.
pub struct WebSocketSink {
    sink: SplitSink<WebSocket, Message>,
    encoding: Arc<PeerEncoding>,
    is_open: bool,
}

impl WebSocketSink {
    async fn send_message(&mut self, message: Message) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }

        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl EventSink for WebSocketSink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let message = match self.encoding.get() {
            Encoding::MessagePack => Message::Binary(codec::encode(event)?.to_vec()),
            Encoding::Json => Message::Text(codec::encode_json(event)?),
        };
        self.send_message(message).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.send_message(Message::Ping(Vec::new())).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(()); // Already closed
        }
        self.is_open = false;

        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
    }
}
