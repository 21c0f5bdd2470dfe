//! Deep merge of a partial update onto a fetched item.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Item, Value};

/// How list fields present in both inputs are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMergePolicy {
    /// The partial's list wholly replaces the original's.
    #[default]
    Replace,
    /// The partial's elements are appended after the original's.
    Append,
    /// Only partial elements not already in the original list are appended.
    Union,
}

/// Merges `partial` onto `original`, producing a new item.
///
/// Scalars in `partial` overwrite, nested maps merge key by key, and lists
/// follow `policy`. Fields absent from `partial` keep their original value.
/// Neither input is modified.
#[must_use]
pub fn merge(original: &Item, partial: &Item, policy: ListMergePolicy) -> Item {
    merge_maps(original, partial, policy)
}

fn merge_maps(
    original: &BTreeMap<String, Value>,
    partial: &BTreeMap<String, Value>,
    policy: ListMergePolicy,
) -> BTreeMap<String, Value> {
    let mut merged = original.clone();
    for (key, incoming) in partial {
        let value = match merged.get(key) {
            Some(existing) => merge_values(existing, incoming, policy),
            None => incoming.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

fn merge_values(existing: &Value, incoming: &Value, policy: ListMergePolicy) -> Value {
    match (existing, incoming) {
        (Value::Map(a), Value::Map(b)) => Value::Map(merge_maps(a, b, policy)),
        (Value::List(a), Value::List(b)) => Value::List(merge_lists(a, b, policy)),
        _ => incoming.clone(),
    }
}

fn merge_lists(existing: &[Value], incoming: &[Value], policy: ListMergePolicy) -> Vec<Value> {
    match policy {
        ListMergePolicy::Replace => incoming.to_vec(),
        ListMergePolicy::Append => existing.iter().chain(incoming).cloned().collect(),
        ListMergePolicy::Union => {
            let mut out = existing.to_vec();
            for value in incoming {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
            out
        }
    }
}
