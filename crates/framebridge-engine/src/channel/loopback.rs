//! In-process transport pair.
//!
//! Models two contexts exchanging `postMessage` calls: a message is
//! delivered only when the sender addressed the receiver's own origin, and
//! it arrives stamped with the sender's origin.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use framebridge_core::{BridgeError, Result};

use super::transport::{RawMessage, Transport};

pub struct LoopbackTransport {
    origin: String,
    peer_origin: String,
    tx: mpsc::UnboundedSender<RawMessage>,
    rx: Mutex<mpsc::UnboundedReceiver<RawMessage>>,
}

impl LoopbackTransport {
    /// Two transports connected to each other. `a` lives at `origin_a`,
    /// `b` at `origin_b`.
    pub fn pair(origin_a: impl Into<String>, origin_b: impl Into<String>) -> (Self, Self) {
        let origin_a = origin_a.into();
        let origin_b = origin_b.into();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let a = Self {
            origin: origin_a.clone(),
            peer_origin: origin_b.clone(),
            tx: tx_a,
            rx: Mutex::new(rx_b),
        };
        let b = Self {
            origin: origin_b,
            peer_origin: origin_a,
            tx: tx_b,
            rx: Mutex::new(rx_a),
        };

        (a, b)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn post(&self, message: String, target_origin: &str) -> Result<()> {
        if target_origin != self.peer_origin {
            tracing::trace!(%target_origin, peer = %self.peer_origin, "target origin mismatch, message not delivered");
            return Ok(());
        }
        self.tx
            .send(RawMessage::new(self.origin.clone(), message))
            .map_err(|_| BridgeError::Transport("peer closed".into()))
    }

    async fn recv(&self) -> Option<RawMessage> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}
