//! Hash/range key prefixing.
//!
//! [`KeyPrefixer`] rewrites the configured key attributes of an item on the
//! way into the store (prepending a prefix) and on the way out (removing it).
//! Only string-valued keys are touched; absent or non-string keys pass
//! through unchanged, so stripping an already-clean item is a no-op.

use crate::types::{Item, Value};

/// Which key attribute a prefix applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Partition (hash) key.
    Hash,
    /// Sort (range) key.
    Range,
}

/// Prefix configuration for one key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyPrefix {
    attribute: String,
    prefix: Option<String>,
}

impl KeyPrefix {
    /// The prefix to use, if non-empty.
    fn active(&self) -> Option<&str> {
        self.prefix.as_deref().filter(|p| !p.is_empty())
    }
}

/// Applies and strips key prefixes for a table's hash and range keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefixer {
    hash: KeyPrefix,
    range: Option<KeyPrefix>,
}

impl KeyPrefixer {
    /// Creates a prefixer for the hash key only.
    #[must_use]
    pub fn new(hash_key: &str, hash_prefix: Option<&str>) -> Self {
        Self {
            hash: KeyPrefix {
                attribute: hash_key.to_string(),
                prefix: hash_prefix.map(str::to_string),
            },
            range: None,
        }
    }

    /// Adds range key handling.
    #[must_use]
    pub fn with_range(mut self, range_key: &str, range_prefix: Option<&str>) -> Self {
        self.range = Some(KeyPrefix {
            attribute: range_key.to_string(),
            prefix: range_prefix.map(str::to_string),
        });
        self
    }

    /// Returns a copy whose prefixes are replaced by any `Some` override.
    ///
    /// Overrides for the range role are ignored when no range key is
    /// configured.
    #[must_use]
    pub fn with_overrides(&self, hash_prefix: Option<&str>, range_prefix: Option<&str>) -> Self {
        let mut next = self.clone();
        if let Some(p) = hash_prefix {
            next.hash.prefix = Some(p.to_string());
        }
        if let (Some(range), Some(p)) = (next.range.as_mut(), range_prefix) {
            range.prefix = Some(p.to_string());
        }
        next
    }

    /// Whether neither role has an active prefix.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.hash.active().is_none() && self.range.as_ref().and_then(KeyPrefix::active).is_none()
    }

    /// Name of the attribute bound to `role`, if configured.
    #[must_use]
    pub fn attribute(&self, role: KeyRole) -> Option<&str> {
        self.config(role).map(|k| k.attribute.as_str())
    }

    /// Role played by `attribute`, if it is one of the key attributes.
    #[must_use]
    pub fn role_of(&self, attribute: &str) -> Option<KeyRole> {
        if self.hash.attribute == attribute {
            return Some(KeyRole::Hash);
        }
        match &self.range {
            Some(range) if range.attribute == attribute => Some(KeyRole::Range),
            _ => None,
        }
    }

    fn config(&self, role: KeyRole) -> Option<&KeyPrefix> {
        match role {
            KeyRole::Hash => Some(&self.hash),
            KeyRole::Range => self.range.as_ref(),
        }
    }

    /// Prepends the `role` prefix to a single key value.
    #[must_use]
    pub fn apply_value(&self, role: KeyRole, value: &Value) -> Value {
        match (self.config(role).and_then(KeyPrefix::active), value) {
            (Some(prefix), Value::String(s)) => Value::String(format!("{prefix}{s}")),
            _ => value.clone(),
        }
    }

    /// Removes one leading `role` prefix from a single key value, if present.
    #[must_use]
    pub fn strip_value(&self, role: KeyRole, value: &Value) -> Value {
        match (self.config(role).and_then(KeyPrefix::active), value) {
            (Some(prefix), Value::String(s)) => match s.strip_prefix(prefix) {
                Some(rest) => Value::String(rest.to_string()),
                None => value.clone(),
            },
            _ => value.clone(),
        }
    }

    /// Returns a copy of `item` with the `role` key prefixed.
    #[must_use]
    pub fn apply_prefix(&self, item: &Item, role: KeyRole) -> Item {
        let mut out = item.clone();
        self.rewrite(&mut out, role, true);
        out
    }

    /// Returns a copy of `item` with the `role` key prefix removed.
    #[must_use]
    pub fn strip_prefix(&self, item: &Item, role: KeyRole) -> Item {
        let mut out = item.clone();
        self.rewrite(&mut out, role, false);
        out
    }

    /// Prefixes both key attributes.
    #[must_use]
    pub fn apply(&self, item: &Item) -> Item {
        let mut out = item.clone();
        self.rewrite(&mut out, KeyRole::Hash, true);
        self.rewrite(&mut out, KeyRole::Range, true);
        out
    }

    /// Strips both key attributes.
    #[must_use]
    pub fn strip(&self, item: &Item) -> Item {
        let mut out = item.clone();
        self.rewrite(&mut out, KeyRole::Hash, false);
        self.rewrite(&mut out, KeyRole::Range, false);
        out
    }

    /// Strips every item of a result list.
    #[must_use]
    pub fn strip_all(&self, items: &[Item]) -> Vec<Item> {
        items.iter().map(|item| self.strip(item)).collect()
    }

    fn rewrite(&self, item: &mut Item, role: KeyRole, add: bool) {
        let Some(config) = self.config(role) else {
            return;
        };
        if config.active().is_none() {
            return;
        }
        if let Some(value) = item.get_mut(&config.attribute) {
            *value = if add {
                self.apply_value(role, value)
            } else {
                self.strip_value(role, value)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn item(pairs: &[(&str, Value)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn prefixer() -> KeyPrefixer {
        KeyPrefixer::new("pk", Some("tenant#")).with_range("sk", Some("type#"))
    }

    #[test]
    fn apply_prefixes_both_keys() {
        let original = item(&[
            ("pk", "123".into()),
            ("sk", "abc".into()),
            ("name", "widget".into()),
        ]);

        let result = prefixer().apply(&original);

        assert_eq!(result["pk"], Value::from("tenant#123"));
        assert_eq!(result["sk"], Value::from("type#abc"));
        assert_eq!(result["name"], Value::from("widget"));
        // original untouched
        assert_eq!(original["pk"], Value::from("123"));
    }

    #[test]
    fn strip_removes_both_prefixes() {
        let stored = item(&[
            ("pk", "tenant#123".into()),
            ("sk", "type#abc".into()),
            ("name", "widget".into()),
        ]);

        let result = prefixer().strip(&stored);

        assert_eq!(result["pk"], Value::from("123"));
        assert_eq!(result["sk"], Value::from("abc"));
        assert_eq!(result["name"], Value::from("widget"));
    }

    #[test]
    fn single_role_only_touches_that_key() {
        let original = item(&[("pk", "1".into()), ("sk", "2".into())]);
        let result = prefixer().apply_prefix(&original, KeyRole::Range);
        assert_eq!(result["pk"], Value::from("1"));
        assert_eq!(result["sk"], Value::from("type#2"));

        let back = prefixer().strip_prefix(&result, KeyRole::Range);
        assert_eq!(back, original);
    }

    #[test]
    fn missing_key_is_left_alone() {
        let original = item(&[("sk", "abc".into())]);
        let result = KeyPrefixer::new("pk", Some("tenant#")).apply(&original);
        assert_eq!(result, original);
    }

    #[test]
    fn non_string_key_is_left_alone() {
        let original = item(&[("pk", Value::Int(7))]);
        let p = KeyPrefixer::new("pk", Some("tenant#"));
        assert_eq!(p.apply(&original), original);
        assert_eq!(p.strip(&original), original);
    }

    #[test]
    fn strip_without_prefix_present_is_noop() {
        let clean = item(&[("pk", "123".into()), ("sk", "abc".into())]);
        assert_eq!(prefixer().strip(&clean), clean);
    }

    #[test]
    fn empty_prefix_is_inactive() {
        let p = KeyPrefixer::new("pk", Some(""));
        assert!(p.is_noop());
        let original = item(&[("pk", "123".into())]);
        assert_eq!(p.apply(&original), original);
    }

    #[test]
    fn overrides_take_precedence() {
        let base = prefixer();
        let overridden = base.with_overrides(Some("org#"), None);
        let original = item(&[("pk", "1".into()), ("sk", "2".into())]);
        let result = overridden.apply(&original);
        assert_eq!(result["pk"], Value::from("org#1"));
        assert_eq!(result["sk"], Value::from("type#2"));
        // base keeps its configuration
        assert_eq!(base.apply(&original)["pk"], Value::from("tenant#1"));
    }

    #[test]
    fn range_override_without_range_key_is_ignored() {
        let p = KeyPrefixer::new("pk", None).with_overrides(None, Some("x#"));
        assert!(p.is_noop());
        assert_eq!(p.attribute(KeyRole::Range), None);
    }

    #[test]
    fn role_of_matches_configured_attributes() {
        let p = prefixer();
        assert_eq!(p.role_of("pk"), Some(KeyRole::Hash));
        assert_eq!(p.role_of("sk"), Some(KeyRole::Range));
        assert_eq!(p.role_of("name"), None);
    }

    #[test]
    fn strip_all_cleans_every_item() {
        let items = vec![
            item(&[("pk", "tenant#1".into())]),
            item(&[("pk", "tenant#2".into())]),
        ];
        let cleaned = prefixer().strip_all(&items);
        let keys: Vec<_> = cleaned.iter().map(|i| i["pk"].clone()).collect();
        assert_eq!(keys, vec![Value::from("1"), Value::from("2")]);
    }

    proptest! {
        #[test]
        fn strip_inverts_apply(
            pk in ".*",
            sk in ".*",
            other in ".*",
            hash_prefix in "[a-z#]{0,6}",
            range_prefix in "[a-z#]{0,6}",
        ) {
            let p = KeyPrefixer::new("pk", Some(&hash_prefix)).with_range("sk", Some(&range_prefix));
            let original = item(&[
                ("pk", Value::String(pk)),
                ("sk", Value::String(sk)),
                ("other", Value::String(other)),
            ]);
            prop_assert_eq!(p.strip(&p.apply(&original)), original);
        }

        #[test]
        fn strip_is_noop_when_nothing_was_applied(pk in "[0-9]{1,8}") {
            let p = KeyPrefixer::new("pk", Some("tenant#"));
            let clean = item(&[("pk", Value::String(pk))]);
            prop_assert_eq!(p.strip(&clean), clean);
        }
    }
}
