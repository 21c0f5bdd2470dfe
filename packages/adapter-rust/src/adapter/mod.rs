//! [`StoreAdapter`]: schema-aware CRUD, batch and optimistic-concurrency
//! operations over an injected [`ItemStore`].
//!
//! Every operation is a stateless pipeline over the immutable
//! [`AdapterConfig`]: prefix keys, fetch and merge (updates only), map to a
//! schema, call the store (conditionally where required), strip prefixes
//! from the result, publish the change. Operations are spread over
//! submodules by kind.

mod batch;
mod delete;
mod options;
mod read;
mod update;
mod write;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use itemshape_core::{Item, KeyPrefixer, SchemaSource};
use tracing::{info_span, Instrument};

use crate::config::AdapterConfig;
use crate::error::{AdapterError, StoreError};
use crate::mapper::SchemaMapper;
use crate::notify::{Notifier, NullPublisher};
use crate::traits::{ItemStore, Publisher};

pub use batch::{batch_items_from_value, BatchSummary};
pub use options::{
    BatchOptions, DeleteOptions, PrefixOverrides, ReadOptions, UpdateOptions, WriteOptions,
};

/// Schema-aware access layer over a key-value store.
///
/// Collaborators are injected: the store at construction, the schema source
/// and publisher through the `with_*` builders. Multiple adapters with
/// different configurations can share one store.
pub struct StoreAdapter {
    config: AdapterConfig,
    prefixer: KeyPrefixer,
    store: Arc<dyn ItemStore>,
    mapper: SchemaMapper,
    notifier: Notifier,
}

impl StoreAdapter {
    /// Creates an adapter with no schema source and notifications disabled
    /// at the transport level.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: AdapterConfig, store: Arc<dyn ItemStore>) -> Result<Self, AdapterError> {
        config.validate()?;
        let prefixer = config.prefixer();
        let notifier = Notifier::new(&config, Arc::new(NullPublisher));
        Ok(Self {
            config,
            prefixer,
            store,
            mapper: SchemaMapper::default(),
            notifier,
        })
    }

    /// Attaches the source named schemas resolve against.
    #[must_use]
    pub fn with_schemas(mut self, source: Arc<dyn SchemaSource>) -> Self {
        self.mapper = SchemaMapper::new(Some(source));
        self
    }

    /// Attaches the notification transport.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.notifier = Notifier::new(&self.config, publisher);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn table(&self) -> &str {
        &self.config.table
    }

    /// The adapter prefixer with per-call overrides applied.
    fn prefixer_for(&self, overrides: &PrefixOverrides) -> KeyPrefixer {
        self.prefixer.with_overrides(
            overrides.hash_prefix.as_deref(),
            overrides.range_prefix.as_deref(),
        )
    }

    /// Per-call schema name, falling back to the configured default.
    fn schema_for<'a>(&'a self, schema: Option<&'a str>) -> Option<&'a str> {
        schema.or(self.config.default_schema.as_deref())
    }

    /// Projects `item` down to the table's primary key attributes.
    fn key_of(&self, item: &Item) -> Item {
        std::iter::once(&self.config.hash_key)
            .chain(self.config.range_key.as_ref())
            .filter_map(|attr| item.get(attr).map(|v| (attr.clone(), v.clone())))
            .collect()
    }

    /// Runs one store call under the configured operation timeout.
    async fn bounded<T, F>(&self, call: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.config.operation_timeout(), call).await {
            Ok(result) => result.map_err(AdapterError::from),
            Err(_) => Err(AdapterError::Timeout {
                timeout_ms: self.config.operation_timeout_ms,
            }),
        }
    }

    /// Wraps an operation in an `adapter_op` span and records its duration
    /// and outcome.
    async fn observe<T, F>(&self, operation: &'static str, body: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        let table = self.table();
        let span = info_span!(
            "adapter_op",
            operation = operation,
            table = table,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = body.await;

            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) if e.is_conditional_failure() => "conflict",
                Err(AdapterError::Notification { .. }) => "committed_unpublished",
                Err(_) => "error",
            };

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            tracing::info!(
                operation = operation,
                table = table,
                duration_ms = duration_ms,
                outcome = outcome,
                "operation complete"
            );

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use itemshape_core::Value;

    use super::*;
    use crate::storage::{key_of, BatchWriteOutput, Page, ReadQuery, WriteCondition, WriteRequest};

    /// Store whose every call sleeps past any reasonable timeout.
    struct StalledStore;

    #[async_trait]
    impl ItemStore for StalledStore {
        async fn get_item(&self, _: &str, _: &Item) -> Result<Option<Item>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
        async fn put_item(
            &self,
            _: &str,
            _: Item,
            _: Option<&WriteCondition>,
        ) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        async fn delete_item(&self, _: &str, _: &Item) -> Result<Option<Item>, StoreError> {
            Ok(None)
        }
        async fn query(&self, _: &str, _: &ReadQuery) -> Result<Page, StoreError> {
            Ok(Page::default())
        }
        async fn scan(&self, _: &str, _: &ReadQuery) -> Result<Page, StoreError> {
            Ok(Page::default())
        }
        async fn batch_write(
            &self,
            _: &str,
            _: Vec<WriteRequest>,
        ) -> Result<BatchWriteOutput, StoreError> {
            Ok(BatchWriteOutput::default())
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let result = StoreAdapter::new(AdapterConfig::new("", "pk"), Arc::new(StalledStore));
        assert!(matches!(result, Err(AdapterError::InvalidConfig(_))));
    }

    #[test]
    fn per_call_prefixes_override_configured_ones() {
        let mut config = AdapterConfig::new("items", "pk");
        config.hash_prefix = Some("tenant#".into());
        let adapter = StoreAdapter::new(config, Arc::new(StalledStore)).unwrap();

        let prefixer = adapter.prefixer_for(&PrefixOverrides::hash("other#"));
        let applied = prefixer.apply(&key_of(&[("pk", "1")]));
        assert_eq!(applied["pk"], Value::from("other#1"));
    }

    #[test]
    fn key_projection_keeps_only_key_attributes() {
        let mut config = AdapterConfig::new("items", "pk");
        config.range_key = Some("sk".into());
        let adapter = StoreAdapter::new(config, Arc::new(StalledStore)).unwrap();

        let mut item = key_of(&[("pk", "1"), ("sk", "a")]);
        item.insert("name".into(), Value::from("widget"));
        assert_eq!(adapter.key_of(&item), key_of(&[("pk", "1"), ("sk", "a")]));
    }

    #[tokio::test(start_paused = true)]
    async fn store_calls_are_bounded_by_the_operation_timeout() {
        let mut config = AdapterConfig::new("items", "pk");
        config.operation_timeout_ms = 50;
        let adapter = StoreAdapter::new(config, Arc::new(StalledStore)).unwrap();

        let err = adapter
            .get(&key_of(&[("pk", "1")]), &ReadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Timeout { timeout_ms: 50 }));
    }
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------
