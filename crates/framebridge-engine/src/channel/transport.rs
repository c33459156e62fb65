use async_trait::async_trait;

use framebridge_core::Result;

/// One inbound message as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Origin of the sending context.
    pub origin: String,
    /// Serialized envelope text.
    pub data: String,
}

impl RawMessage {
    pub fn new(origin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            data: data.into(),
        }
    }
}

/// Cross-context text channel.
///
/// Object safe, so bridges hold it as `Arc<dyn Transport>`. Delivery may be
/// lossy; implementations only need FIFO order per direction.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Hand a serialized envelope to the transport, addressed to the context
    /// whose origin is `target_origin`. Must not block.
    fn post(&self, message: String, target_origin: &str) -> Result<()>;

    /// Next inbound message, or `None` once the channel is closed.
    async fn recv(&self) -> Option<RawMessage>;
}
