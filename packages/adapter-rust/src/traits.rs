use async_trait::async_trait;
use itemshape_core::Item;

use crate::config::MAX_BATCH_SIZE;
use crate::error::StoreError;
use crate::notify::OutboundMessage;
use crate::storage::{BatchWriteOutput, Page, ReadQuery, WriteCondition, WriteRequest};

/// Key-value store the adapter writes through.
///
/// Implementations wrap a store client (or hold data in memory for tests).
/// Conditional writes are a required capability: the adapter never
/// emulates them.
///
/// Used as `Arc<dyn ItemStore>`.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Load a single item by primary key.
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError>;

    /// Store an item, replacing any existing one with the same key.
    ///
    /// When `condition` is given the write only commits if it holds against
    /// the currently stored item; otherwise
    /// [`StoreError::ConditionalCheckFailed`] is returned.
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<(), StoreError>;

    /// Delete an item by primary key, returning the removed attributes.
    async fn delete_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError>;

    /// Run a key-condition query.
    async fn query(&self, table: &str, query: &ReadQuery) -> Result<Page, StoreError>;

    /// Run a full-table scan.
    async fn scan(&self, table: &str, query: &ReadQuery) -> Result<Page, StoreError>;

    /// Apply up to [`max_batch_size`](Self::max_batch_size) puts/deletes.
    ///
    /// Requests that were not applied come back in
    /// [`BatchWriteOutput::unprocessed`].
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, StoreError>;

    /// Largest request count a single batch call accepts.
    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }
}

/// Pub/sub transport for change notifications.
///
/// Used as `Arc<dyn Publisher>`.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Dispatch a message, returning the transport's message id.
    async fn publish(&self, message: OutboundMessage) -> anyhow::Result<String>;
}
