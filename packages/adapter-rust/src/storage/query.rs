//! Read-side request and response types: [`ReadQuery`], [`Condition`], [`Page`].

use std::cmp::Ordering;

use itemshape_core::{Item, KeyPrefixer, Value};

use super::condition::compare_values;

/// Comparison applied to one attribute of a candidate item.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals { attribute: String, value: Value },
    BeginsWith { attribute: String, prefix: String },
    Between { attribute: String, low: Value, high: Value },
    GreaterThan { attribute: String, value: Value },
    LessThan { attribute: String, value: Value },
}

impl Condition {
    /// `attribute = value`.
    #[must_use]
    pub fn equals(attribute: &str, value: impl Into<Value>) -> Self {
        Condition::Equals {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    /// `begins_with(attribute, prefix)`.
    #[must_use]
    pub fn begins_with(attribute: &str, prefix: &str) -> Self {
        Condition::BeginsWith {
            attribute: attribute.to_string(),
            prefix: prefix.to_string(),
        }
    }

    /// Attribute the condition inspects.
    #[must_use]
    pub fn attribute(&self) -> &str {
        match self {
            Condition::Equals { attribute, .. }
            | Condition::BeginsWith { attribute, .. }
            | Condition::Between { attribute, .. }
            | Condition::GreaterThan { attribute, .. }
            | Condition::LessThan { attribute, .. } => attribute,
        }
    }

    /// Whether `item` satisfies the condition. Missing attributes never match.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        let Some(actual) = item.get(self.attribute()) else {
            return false;
        };
        match self {
            Condition::Equals { value, .. } => actual == value,
            Condition::BeginsWith { prefix, .. } => {
                actual.as_str().is_some_and(|s| s.starts_with(prefix.as_str()))
            }
            Condition::Between { low, high, .. } => {
                matches!(
                    compare_values(actual, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(actual, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Condition::GreaterThan { value, .. } => {
                compare_values(actual, value) == Some(Ordering::Greater)
            }
            Condition::LessThan { value, .. } => {
                compare_values(actual, value) == Some(Ordering::Less)
            }
        }
    }

    /// Rewrites the compared values when the attribute is a key attribute.
    fn prefixed(&self, prefixer: &KeyPrefixer) -> Self {
        let Some(role) = prefixer.role_of(self.attribute()) else {
            return self.clone();
        };
        let apply = |v: &Value| prefixer.apply_value(role, v);
        match self {
            Condition::Equals { attribute, value } => Condition::Equals {
                attribute: attribute.clone(),
                value: apply(value),
            },
            Condition::BeginsWith { attribute, prefix } => Condition::BeginsWith {
                attribute: attribute.clone(),
                prefix: match apply(&Value::String(prefix.clone())) {
                    Value::String(s) => s,
                    _ => prefix.clone(),
                },
            },
            Condition::Between {
                attribute,
                low,
                high,
            } => Condition::Between {
                attribute: attribute.clone(),
                low: apply(low),
                high: apply(high),
            },
            Condition::GreaterThan { attribute, value } => Condition::GreaterThan {
                attribute: attribute.clone(),
                value: apply(value),
            },
            Condition::LessThan { attribute, value } => Condition::LessThan {
                attribute: attribute.clone(),
                value: apply(value),
            },
        }
    }
}

/// Parameters for a query or scan.
///
/// Queries narrow by `key_conditions`; scans usually leave them empty and
/// rely on `filters`. Both honor `limit` (items evaluated per page) and
/// resume after `exclusive_start_key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadQuery {
    /// Secondary index to read from, if not the base table.
    pub index_name: Option<String>,
    pub key_conditions: Vec<Condition>,
    pub filters: Vec<Condition>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
}

impl ReadQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(mut self, condition: Condition) -> Self {
        self.key_conditions.push(condition);
        self
    }

    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    #[must_use]
    pub fn index(mut self, index_name: &str) -> Self {
        self.index_name = Some(index_name.to_string());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn start_after(mut self, key: Item) -> Self {
        self.exclusive_start_key = Some(key);
        self
    }

    /// Returns a copy whose key-attribute values carry the store prefixes.
    #[must_use]
    pub fn with_prefixed_keys(&self, prefixer: &KeyPrefixer) -> Self {
        Self {
            index_name: self.index_name.clone(),
            key_conditions: self
                .key_conditions
                .iter()
                .map(|c| c.prefixed(prefixer))
                .collect(),
            filters: self.filters.iter().map(|c| c.prefixed(prefixer)).collect(),
            limit: self.limit,
            exclusive_start_key: self
                .exclusive_start_key
                .as_ref()
                .map(|key| prefixer.apply(key)),
        }
    }

    /// Whether `item` satisfies every key condition.
    #[must_use]
    pub fn matches_key(&self, item: &Item) -> bool {
        self.key_conditions.iter().all(|c| c.matches(item))
    }

    /// Whether `item` satisfies every filter.
    #[must_use]
    pub fn matches_filters(&self, item: &Item) -> bool {
        self.filters.iter().all(|c| c.matches(item))
    }
}

/// One page of query or scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Key to resume from, when more results remain.
    pub last_evaluated_key: Option<Item>,
    /// Items evaluated before filters were applied.
    pub scanned_count: usize,
}

/// How an update locates the item it modifies.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Single-item get by primary key.
    Key(Item),
    /// Query; the first returned item is used.
    Query(ReadQuery),
}

/// Which multi-item read to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOperation {
    Query,
    Scan,
}

impl ReadOperation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReadOperation::Query => "query",
            ReadOperation::Scan => "scan",
        }
    }
}

/// Convenience for building a key item from `(attribute, value)` pairs.
#[must_use]
pub fn key_of(pairs: &[(&str, &str)]) -> Item {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
        .collect()
}
