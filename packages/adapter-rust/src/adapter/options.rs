//! Per-call option structs for [`StoreAdapter`](super::StoreAdapter)
//! operations. Every field left at its default defers to the adapter
//! configuration.

use itemshape_core::ListMergePolicy;

use crate::notify::PublishOptions;

/// Per-call key prefix overrides. A `Some` value replaces the configured
/// prefix for that role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixOverrides {
    pub hash_prefix: Option<String>,
    pub range_prefix: Option<String>,
}

/// Options for `create` and `overwrite`.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Schema to map the payload onto, overriding the configured default.
    pub schema: Option<String>,
    pub prefixes: PrefixOverrides,
    pub publish: PublishOptions,
}

/// Options for `get`, `read`, `query` and `scan`.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub schema: Option<String>,
    pub prefixes: PrefixOverrides,
    /// Return the store response untouched: no prefix stripping, no mapping.
    pub raw: bool,
}

/// Options for `update`.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub schema: Option<String>,
    pub prefixes: PrefixOverrides,
    /// Overrides [`IdempotenceConfig::use_latest`](crate::config::IdempotenceConfig::use_latest).
    pub use_latest: Option<bool>,
    /// Overrides [`IdempotenceConfig::raise_on_conflict`](crate::config::IdempotenceConfig::raise_on_conflict).
    pub raise_on_conflict: Option<bool>,
    /// Overrides the configured list merge policy.
    pub list_policy: Option<ListMergePolicy>,
    pub publish: PublishOptions,
}

/// Options for `delete`.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub prefixes: PrefixOverrides,
    pub publish: PublishOptions,
}

/// Options for `batch_insert` and `batch_delete`.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Schema applied to inserted items.
    pub schema: Option<String>,
    pub prefixes: PrefixOverrides,
    /// Items per store call, overriding the configured batch size.
    pub batch_size: Option<usize>,
}

impl PrefixOverrides {
    /// Overrides the hash key prefix only.
    #[must_use]
    pub fn hash(prefix: &str) -> Self {
        Self {
            hash_prefix: Some(prefix.to_string()),
            range_prefix: None,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    #[must_use]
    pub fn prefixes(mut self, prefixes: PrefixOverrides) -> Self {
        self.prefixes = prefixes;
        self
    }

    #[must_use]
    pub fn publish(mut self, publish: PublishOptions) -> Self {
        self.publish = publish;
        self
    }
}

impl ReadOptions {
    #[must_use]
    pub fn raw() -> Self {
        Self {
            raw: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    #[must_use]
    pub fn prefixes(mut self, prefixes: PrefixOverrides) -> Self {
        self.prefixes = prefixes;
        self
    }
}

impl UpdateOptions {
    #[must_use]
    pub fn use_latest(mut self, use_latest: bool) -> Self {
        self.use_latest = Some(use_latest);
        self
    }

    #[must_use]
    pub fn raise_on_conflict(mut self, raise: bool) -> Self {
        self.raise_on_conflict = Some(raise);
        self
    }

    #[must_use]
    pub fn list_policy(mut self, policy: ListMergePolicy) -> Self {
        self.list_policy = Some(policy);
        self
    }
}

impl BatchOptions {
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}
