//! Conditional-write predicates and the store-native value ordering used
//! by key conditions and filters.

use std::cmp::Ordering;

use itemshape_core::{Item, Value};

/// Server-side predicate a conditional put must satisfy to commit.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCondition {
    /// No stored item carries `attribute` (insert-if-absent).
    AttributeNotExists { attribute: String },
    /// The stored `attribute` still equals `value` (optimistic concurrency).
    AttributeEquals { attribute: String, value: Value },
}

impl WriteCondition {
    /// Attribute the predicate inspects.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            WriteCondition::AttributeNotExists { attribute }
            | WriteCondition::AttributeEquals { attribute, .. } => attribute,
        }
    }

    /// Evaluates the predicate against the currently stored item, if any.
    #[must_use]
    pub fn evaluate(&self, current: Option<&Item>) -> bool {
        let stored = current.and_then(|item| item.get(self.attribute()));
        match self {
            WriteCondition::AttributeNotExists { .. } => stored.is_none(),
            WriteCondition::AttributeEquals { value, .. } => stored == Some(value),
        }
    }
}

/// Orders two values the way a key-value store compares attributes:
/// numbers numerically, strings by bytes. Other combinations are
/// incomparable.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(modified: &str) -> Item {
        let mut item = Item::new();
        item.insert("pk".into(), Value::from("1"));
        item.insert("modified".into(), Value::from(modified));
        item
    }

    #[test]
    fn not_exists_holds_only_for_absent_items() {
        let cond = WriteCondition::AttributeNotExists {
            attribute: "pk".into(),
        };
        assert!(cond.evaluate(None));
        assert!(!cond.evaluate(Some(&stored("2020-10-05"))));
    }

    #[test]
    fn equals_compares_stored_value() {
        let cond = WriteCondition::AttributeEquals {
            attribute: "modified".into(),
            value: Value::from("2020-10-05"),
        };
        assert!(cond.evaluate(Some(&stored("2020-10-05"))));
        assert!(!cond.evaluate(Some(&stored("2020-12-01"))));
        assert!(!cond.evaluate(None));
    }

    #[test]
    fn mixed_numbers_compare_numerically() {
        assert_eq!(
            compare_values(&Value::Int(2), &Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(compare_values(&Value::Int(2), &Value::from("2")), None);
    }
}
