//! In-process [`Publisher`] that records every message.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::notify::OutboundMessage;
use crate::traits::Publisher;

/// Records published messages in memory.
///
/// Can be switched into a failing mode with [`fail_with`](Self::fail_with)
/// to exercise notification error paths.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<OutboundMessage>>,
    failure: Mutex<Option<String>>,
}

impl MemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail with `reason`.
    pub fn fail_with(&self, reason: &str) {
        *self.failure.lock() = Some(reason.to_string());
    }

    /// Restores normal operation.
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Messages published so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, message: OutboundMessage) -> anyhow::Result<String> {
        let failure = self.failure.lock().clone();
        if let Some(reason) = failure {
            anyhow::bail!("publish to '{}' failed: {reason}", message.topic);
        }
        self.messages.lock().push(message);
        Ok(Uuid::new_v4().to_string())
    }
}
