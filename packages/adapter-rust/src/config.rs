//! Adapter configuration types.
//!
//! [`AdapterConfig`] is built once per [`StoreAdapter`](crate::StoreAdapter)
//! and never changes afterwards. Every type here deserializes from JSON with
//! defaults for the optional parts.

use std::collections::BTreeMap;
use std::time::Duration;

use itemshape_core::{KeyPrefixer, ListMergePolicy, Value};
use serde::Deserialize;

use crate::error::AdapterError;

/// Largest number of write requests a single batch call may carry.
pub const MAX_BATCH_SIZE: usize = 25;

/// Immutable configuration owned by one adapter instance.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Store table identifier.
    pub table: String,
    /// Name of the hash (partition) key attribute.
    pub hash_key: String,
    /// Name of the range (sort) key attribute, if the table has one.
    #[serde(default)]
    pub range_key: Option<String>,
    /// Prefix prepended to hash key values on the way into the store.
    #[serde(default)]
    pub hash_prefix: Option<String>,
    /// Prefix prepended to range key values on the way into the store.
    #[serde(default)]
    pub range_prefix: Option<String>,
    /// Schema applied when a call does not name one.
    #[serde(default)]
    pub default_schema: Option<String>,
    /// Optimistic-concurrency settings.
    #[serde(default)]
    pub idempotence: IdempotenceConfig,
    /// Change notification target. `None` disables publishing.
    #[serde(default)]
    pub notification: Option<NotificationConfig>,
    /// Retry policy for unprocessed batch items.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Upper bound for every individual store call, in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Default chunk size for batch operations.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// List handling used when merging updates.
    #[serde(default)]
    pub list_merge_policy: ListMergePolicy,
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_max_batch_size() -> usize {
    MAX_BATCH_SIZE
}

impl AdapterConfig {
    /// Creates a configuration with the two required settings and defaults
    /// for everything else.
    #[must_use]
    pub fn new(table: &str, hash_key: &str) -> Self {
        Self {
            table: table.to_string(),
            hash_key: hash_key.to_string(),
            range_key: None,
            hash_prefix: None,
            range_prefix: None,
            default_schema: None,
            idempotence: IdempotenceConfig::default(),
            notification: None,
            retry: RetryPolicy::default(),
            operation_timeout_ms: default_operation_timeout_ms(),
            max_batch_size: default_max_batch_size(),
            list_merge_policy: ListMergePolicy::default(),
        }
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidConfig`] if the text does not
    /// deserialize or the result fails [`validate`](Self::validate).
    pub fn from_json(text: &str) -> Result<Self, AdapterError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| AdapterError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the adapter relies on.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidConfig`] for an empty table or hash key
    /// name, a range prefix without a range key, or a batch size outside
    /// `1..=MAX_BATCH_SIZE`.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.table.is_empty() {
            return Err(AdapterError::InvalidConfig("table must not be empty".into()));
        }
        if self.hash_key.is_empty() {
            return Err(AdapterError::InvalidConfig(
                "hash_key must not be empty".into(),
            ));
        }
        if self.range_prefix.is_some() && self.range_key.is_none() {
            return Err(AdapterError::InvalidConfig(
                "range_prefix requires range_key".into(),
            ));
        }
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(AdapterError::InvalidConfig(format!(
                "max_batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        Ok(())
    }

    /// Builds the adapter-level key prefixer.
    #[must_use]
    pub fn prefixer(&self) -> KeyPrefixer {
        let prefixer = KeyPrefixer::new(&self.hash_key, self.hash_prefix.as_deref());
        match &self.range_key {
            Some(range_key) => prefixer.with_range(range_key, self.range_prefix.as_deref()),
            None => prefixer,
        }
    }

    /// The per-call store timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Optimistic-concurrency settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdempotenceConfig {
    /// Attribute used as the concurrency token. `None` disables the checks.
    pub attribute: Option<String>,
    /// Prefer the newest token value instead of failing on conflicts.
    pub use_latest: bool,
    /// Convert store conditional failures into
    /// [`AdapterError::IdempotenceConflict`].
    pub raise_on_conflict: bool,
}

/// Exponential backoff for unprocessed batch items.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits, for tests.
    #[must_use]
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`,
    /// capped at `max_delay_ms`.
    #[must_use]
    pub fn delay(&self, attempt: usize) -> Duration {
        let factor = 1_u64
            .checked_shl(u32::try_from(attempt).unwrap_or(u32::MAX))
            .unwrap_or(u64::MAX);
        let millis = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_delay_ms))
    }
}

/// Publish target and default attributes for change notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Topic identifier handed to the publisher.
    pub topic: String,
    /// Publisher endpoint override.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Attributes attached to every message.
    #[serde(default)]
    pub default_attributes: BTreeMap<String, Value>,
    /// Also attach `table`, `hash_key` and `idempotence_key` as the lowest
    /// precedence layer.
    #[serde(default = "default_true")]
    pub include_adapter_attributes: bool,
}

fn default_true() -> bool {
    true
}

impl NotificationConfig {
    /// Creates a config for `topic` with no extra attributes.
    #[must_use]
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            endpoint: None,
            default_attributes: BTreeMap::new(),
            include_adapter_attributes: true,
        }
    }
}
