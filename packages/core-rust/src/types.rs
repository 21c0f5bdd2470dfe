use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored item: attribute name to value.
///
/// Uses `BTreeMap` for deterministic iteration and serialization order.
/// Attribute names are unique by construction.
pub type Item = BTreeMap<String, Value>;

/// Dynamic attribute value held by an [`Item`].
///
/// Covers the JSON-compatible subset a key-value store attribute can carry.
/// Serializes untagged so an item renders as an ordinary JSON object, which
/// is what notification bodies and JSON configuration expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Integer number (signed 64-bit).
    Int(i64),
    /// Floating-point number (64-bit IEEE 754).
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested attribute map.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string slice if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested map if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the elements if this is a [`Value::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Numeric view of `Int` and `Float` values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Short type label used in log fields and error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            // Non-finite floats have no JSON representation.
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

/// Converts a JSON object into an [`Item`].
///
/// Returns `None` when `json` is not an object.
#[must_use]
pub fn item_from_json(json: serde_json::Value) -> Option<Item> {
    match Value::from(json) {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

/// Converts an [`Item`] into a JSON object.
#[must_use]
pub fn item_to_json(item: Item) -> serde_json::Value {
    Value::Map(item).into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_object_converts_to_item() {
        let item = item_from_json(json!({
            "id": "abc",
            "count": 3,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"flag": true, "missing": null}
        }))
        .unwrap();

        assert_eq!(item["id"], Value::String("abc".into()));
        assert_eq!(item["count"], Value::Int(3));
        assert_eq!(item["ratio"], Value::Float(0.5));
        assert_eq!(
            item["tags"],
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
        let nested = item["nested"].as_map().unwrap();
        assert_eq!(nested["flag"], Value::Bool(true));
        assert_eq!(nested["missing"], Value::Null);
    }

    #[test]
    fn non_object_json_is_not_an_item() {
        assert!(item_from_json(json!([1, 2, 3])).is_none());
        assert!(item_from_json(json!("text")).is_none());
    }

    #[test]
    fn item_serializes_as_plain_json() {
        let item = item_from_json(json!({"pk": "1", "n": 2, "list": [{"x": 1}]})).unwrap();
        let text = serde_json::to_string(&item).unwrap();
        assert_eq!(text, r#"{"list":[{"x":1}],"n":2,"pk":"1"}"#);

        let back: Item = serde_json::from_str(&text).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn item_to_json_preserves_structure() {
        let original = json!({"a": {"b": [1, "two", false]}});
        let item = item_from_json(original.clone()).unwrap();
        assert_eq!(item_to_json(item), original);
    }

    #[test]
    fn kind_labels() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::Int(1).kind(), "number");
        assert_eq!(Value::Float(1.5).kind(), "number");
        assert_eq!(Value::List(vec![]).kind(), "list");
        assert_eq!(Value::Map(BTreeMap::new()).kind(), "map");
    }
}
