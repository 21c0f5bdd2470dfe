use async_trait::async_trait;

use crate::notify::OutboundMessage;
use crate::traits::Publisher;

/// Publisher that accepts and discards every message.
///
/// Used when an adapter is built without a transport.
pub struct NullPublisher;

#[async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, _message: OutboundMessage) -> anyhow::Result<String> {
        Ok(String::new())
    }
}
