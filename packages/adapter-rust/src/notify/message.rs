//! Outbound message types in the pub/sub attribute format.

use std::collections::BTreeMap;

use itemshape_core::Value;
use serde::Serialize;

/// Wire data type of a message attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeDataType {
    String,
    Number,
}

/// A single message attribute as the transport receives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageAttribute {
    pub data_type: AttributeDataType,
    pub value: String,
}

impl MessageAttribute {
    /// A `String` attribute.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self {
            data_type: AttributeDataType::String,
            value: value.to_string(),
        }
    }

    /// Formats an item value as an attribute.
    ///
    /// Nulls yield `None` and are not sent. Numbers become `Number`
    /// attributes; booleans, lists and maps are sent as `String` (the latter
    /// two as JSON text).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let (data_type, value) = match value {
            Value::Null => return None,
            Value::Int(n) => (AttributeDataType::Number, n.to_string()),
            Value::Float(f) => (AttributeDataType::Number, f.to_string()),
            Value::String(s) => (AttributeDataType::String, s.clone()),
            Value::Bool(b) => (AttributeDataType::String, b.to_string()),
            Value::List(_) | Value::Map(_) => (
                AttributeDataType::String,
                serde_json::Value::from(value.clone()).to_string(),
            ),
        };
        Some(Self { data_type, value })
    }
}

/// Kind of committed change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    /// The verb carried in the `operation` attribute.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

/// Per-call notification settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishOptions {
    /// Attributes layered over the configured defaults.
    pub attributes: BTreeMap<String, Value>,
    /// Message group for FIFO topics.
    pub group_id: Option<String>,
    /// Deduplication id for FIFO topics.
    pub deduplication_id: Option<String>,
}

impl PublishOptions {
    /// Adds a per-call attribute.
    #[must_use]
    pub fn attribute(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Targets a FIFO message group.
    #[must_use]
    pub fn group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    /// Sets the FIFO deduplication id.
    #[must_use]
    pub fn deduplication(mut self, deduplication_id: &str) -> Self {
        self.deduplication_id = Some(deduplication_id.to_string());
        self
    }
}

/// A fully formatted message ready for a [`Publisher`](crate::traits::Publisher).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub topic: String,
    pub endpoint: Option<String>,
    /// JSON-encoded payload.
    pub body: String,
    pub attributes: BTreeMap<String, MessageAttribute>,
    pub group_id: Option<String>,
    pub deduplication_id: Option<String>,
}

impl OutboundMessage {
    /// The `operation` attribute value, if present.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.attributes.get("operation").map(|a| a.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_formatting_follows_value_kind() {
        assert_eq!(MessageAttribute::from_value(&Value::Null), None);
        assert_eq!(
            MessageAttribute::from_value(&Value::Int(3)),
            Some(MessageAttribute {
                data_type: AttributeDataType::Number,
                value: "3".into(),
            })
        );
        assert_eq!(
            MessageAttribute::from_value(&Value::Bool(true)),
            Some(MessageAttribute::string("true"))
        );
        assert_eq!(
            MessageAttribute::from_value(&Value::List(vec![Value::from("a")])),
            Some(MessageAttribute::string(r#"["a"]"#))
        );
    }

    #[test]
    fn publish_options_builder() {
        let opts = PublishOptions::default()
            .attribute("source", "api")
            .group("orders")
            .deduplication("order-1");
        assert_eq!(opts.attributes["source"], Value::from("api"));
        assert_eq!(opts.group_id.as_deref(), Some("orders"));
        assert_eq!(opts.deduplication_id.as_deref(), Some("order-1"));
    }
}
