use itemshape_core::Item;
use tracing::debug;

use super::{StoreAdapter, WriteOptions};
use crate::error::{AdapterError, StoreError};
use crate::notify::EventKind;
use crate::storage::WriteCondition;

impl StoreAdapter {
    /// Inserts `data` only if no item with the same key exists.
    ///
    /// Returns the stored item with prefixes stripped.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::ConditionalWrite`] if the key is already taken
    /// - [`AdapterError::SchemaNotFound`] for an unresolvable schema
    /// - [`AdapterError::Notification`] if the insert committed but could not
    ///   be published
    pub async fn create(&self, data: &Item, options: &WriteOptions) -> Result<Item, AdapterError> {
        self.observe("create", async {
            let condition = WriteCondition::AttributeNotExists {
                attribute: self.config.hash_key.clone(),
            };
            self.put(data, options, Some(condition)).await
        })
        .await
    }

    /// Stores `data` unconditionally, replacing any existing item.
    ///
    /// Publishes as `create`.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create), minus the existence check.
    pub async fn overwrite(
        &self,
        data: &Item,
        options: &WriteOptions,
    ) -> Result<Item, AdapterError> {
        self.observe("overwrite", self.put(data, options, None))
            .await
    }

    async fn put(
        &self,
        data: &Item,
        options: &WriteOptions,
        condition: Option<WriteCondition>,
    ) -> Result<Item, AdapterError> {
        let prefixer = self.prefixer_for(&options.prefixes);
        let prefixed = prefixer.apply(data);
        let stored = self
            .mapper
            .map(&prefixed, self.schema_for(options.schema.as_deref()))?;

        let result = self
            .bounded(
                self.store
                    .put_item(self.table(), stored.clone(), condition.as_ref()),
            )
            .await;
        match result {
            Ok(()) => {}
            Err(AdapterError::Store(source @ StoreError::ConditionalCheckFailed { .. })) => {
                debug!(table = self.table(), "insert rejected, key exists");
                return Err(AdapterError::ConditionalWrite {
                    table: self.config.table.clone(),
                    source,
                });
            }
            Err(e) => return Err(e),
        }

        let accepted = prefixer.strip(&stored);
        self.notifier
            .publish(EventKind::Create, &accepted, &options.publish)
            .await?;
        Ok(accepted)
    }
}
