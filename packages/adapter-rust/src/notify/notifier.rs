//! Formats committed changes into [`OutboundMessage`]s and hands them to the
//! configured [`Publisher`].
//!
//! Attribute layers, lowest to highest precedence:
//!
//! 1. adapter attributes (`table`, `hash_key`, `idempotence_key`), when
//!    [`NotificationConfig::include_adapter_attributes`] is set
//! 2. [`NotificationConfig::default_attributes`]
//! 3. per-call [`PublishOptions::attributes`]
//! 4. `operation`, which always wins

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use itemshape_core::{item_to_json, Item, Value};
use tracing::{debug, warn};

use crate::config::{AdapterConfig, NotificationConfig};
use crate::error::AdapterError;
use crate::notify::{EventKind, MessageAttribute, OutboundMessage, PublishOptions};
use crate::traits::Publisher;

/// Publishes change events for one adapter.
pub struct Notifier {
    config: Option<NotificationConfig>,
    adapter_attributes: BTreeMap<String, Value>,
    publisher: Arc<dyn Publisher>,
    timeout: Duration,
}

impl Notifier {
    /// Builds a notifier from the adapter configuration. Publish calls share
    /// the adapter's operation timeout.
    #[must_use]
    pub fn new(config: &AdapterConfig, publisher: Arc<dyn Publisher>) -> Self {
        let mut adapter_attributes = BTreeMap::new();
        adapter_attributes.insert("table".to_string(), Value::from(config.table.as_str()));
        adapter_attributes.insert(
            "hash_key".to_string(),
            Value::from(config.hash_key.as_str()),
        );
        if let Some(attribute) = &config.idempotence.attribute {
            adapter_attributes.insert(
                "idempotence_key".to_string(),
                Value::from(attribute.as_str()),
            );
        }
        Self {
            config: config.notification.clone(),
            adapter_attributes,
            publisher,
            timeout: config.operation_timeout(),
        }
    }

    /// Merges the attribute layers into their final wire form.
    #[must_use]
    pub fn attributes(
        &self,
        kind: EventKind,
        options: &PublishOptions,
    ) -> BTreeMap<String, MessageAttribute> {
        let Some(config) = &self.config else {
            return BTreeMap::new();
        };

        let mut merged: BTreeMap<&str, &Value> = BTreeMap::new();
        if config.include_adapter_attributes {
            merged.extend(self.adapter_attributes.iter().map(|(k, v)| (k.as_str(), v)));
        }
        merged.extend(config.default_attributes.iter().map(|(k, v)| (k.as_str(), v)));
        merged.extend(options.attributes.iter().map(|(k, v)| (k.as_str(), v)));

        let mut attributes: BTreeMap<String, MessageAttribute> = merged
            .into_iter()
            .filter_map(|(k, v)| MessageAttribute::from_value(v).map(|a| (k.to_string(), a)))
            .collect();
        attributes.insert(
            "operation".to_string(),
            MessageAttribute::string(kind.as_str()),
        );
        attributes
    }

    /// Formats the message for `item`, or `None` when no topic is configured.
    #[must_use]
    pub fn message(
        &self,
        kind: EventKind,
        item: &Item,
        options: &PublishOptions,
    ) -> Option<OutboundMessage> {
        let config = self.config.as_ref()?;
        Some(OutboundMessage {
            topic: config.topic.clone(),
            endpoint: config.endpoint.clone(),
            body: item_to_json(item.clone()).to_string(),
            attributes: self.attributes(kind, options),
            group_id: options.group_id.clone(),
            deduplication_id: options.deduplication_id.clone(),
        })
    }

    /// Publishes a committed change.
    ///
    /// Returns the transport's message id, or `None` when publishing is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Notification`] carrying `item` if the
    /// publisher fails or does not answer within the operation timeout. The
    /// write that produced `item` is unaffected.
    pub async fn publish(
        &self,
        kind: EventKind,
        item: &Item,
        options: &PublishOptions,
    ) -> Result<Option<String>, AdapterError> {
        let Some(message) = self.message(kind, item, options) else {
            return Ok(None);
        };
        let topic = message.topic.clone();

        let sent = match tokio::time::timeout(self.timeout, self.publisher.publish(message)).await {
            Ok(sent) => sent,
            Err(_) => Err(anyhow::anyhow!(
                "publish timed out after {}ms",
                self.timeout.as_millis()
            )),
        };
        match sent {
            Ok(id) => {
                debug!(topic = %topic, operation = kind.as_str(), message_id = %id, "notification published");
                Ok(Some(id))
            }
            Err(e) => {
                warn!(topic = %topic, operation = kind.as_str(), error = %e, "notification publish failed");
                Err(AdapterError::Notification {
                    operation: kind.as_str(),
                    committed: Box::new(item.clone()),
                    source: e,
                })
            }
        }
    }
}
