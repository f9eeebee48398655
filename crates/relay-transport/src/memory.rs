//! In-memory transport.
//!
//! Connects a session to a [`MemoryPeer`] through tokio channels. The peer
//! side plays the client: it sends JSON text exactly as a browser would and
//! reads back decoded server events.

use async_trait::async_trait;
use relay_protocol::{codec, ClientEvent, ServerEvent};
use tokio::sync::mpsc;

use crate::traits::{EventSink, EventSource, Received, TransportError};

type Inbound = Result<Received, TransportError>;

/// Create a connected source/sink pair and the peer driving them.
#[must_use]
pub fn channel() -> (MemorySource, MemorySink, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    (
        MemorySource { rx: in_rx },
        MemorySink { tx: Some(out_tx) },
        MemoryPeer {
            tx: Some(in_tx),
            rx: out_rx,
        },
    )
}

/// Inbound half backed by a channel.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl EventSource for MemorySource {
    async fn recv(&mut self) -> Result<Option<Received>, TransportError> {
        match self.rx.recv().await {
            Some(inbound) => inbound.map(Some),
            None => Ok(None),
        }
    }
}

/// Outbound half backed by a channel.
pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<ServerEvent>>,
}

#[async_trait]
impl EventSink for MemorySink {
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(event.clone())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// The client end of an in-memory connection.
pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl MemoryPeer {
    fn push(&self, inbound: Inbound) -> bool {
        self.tx
            .as_ref()
            .is_some_and(|tx| tx.send(inbound).is_ok())
    }

    /// Send a typed event.
    ///
    /// Returns `false` if the session is gone.
    pub fn send(&self, event: ClientEvent) -> bool {
        self.push(Ok(Received::Event(event)))
    }

    /// Send raw JSON text, decoded the way the WebSocket transport does.
    pub fn send_text(&self, text: &str) -> bool {
        let inbound = codec::decode_json::<ClientEvent>(text)
            .map(Received::Event)
            .map_err(TransportError::from);
        self.push(inbound)
    }

    /// Send a heartbeat.
    pub fn heartbeat(&self) -> bool {
        self.push(Ok(Received::Heartbeat))
    }

    /// Close the client side; the session sees end of stream.
    pub fn hang_up(&mut self) {
        self.tx = None;
    }

    /// Wait for the next server event.
    ///
    /// Returns `None` once the session has closed its sink.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.rx.recv().await
    }

    /// Take the next server event if one is queued.
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        self.rx.try_recv().ok()
    }
}
