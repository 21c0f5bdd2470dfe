//! itemshape adapter: a schema-aware access layer over a key-value store.
//!
//! [`StoreAdapter`] offers create/overwrite/get/query/scan/update/delete and
//! chunked batch writes, applying key prefixes, schema mapping and
//! optimistic-concurrency checks, and publishing a notification after each
//! committed single-item write. The store and the notification transport
//! are injected as [`ItemStore`] and [`Publisher`] trait objects.

pub mod adapter;
pub mod config;
pub mod error;
pub mod idempotence;
pub mod mapper;
pub mod notify;
pub mod storage;
pub mod telemetry;
pub mod traits;

pub use adapter::{
    batch_items_from_value, BatchOptions, BatchSummary, DeleteOptions, PrefixOverrides,
    ReadOptions, StoreAdapter, UpdateOptions, WriteOptions,
};
pub use config::{AdapterConfig, IdempotenceConfig, NotificationConfig, RetryPolicy};
pub use error::{AdapterError, StoreError};
pub use mapper::SchemaMapper;
pub use notify::{
    EventKind, MemoryPublisher, MessageAttribute, Notifier, NullPublisher, OutboundMessage,
    PublishOptions,
};
pub use storage::{
    Condition, Lookup, MemoryStore, Page, ReadOperation, ReadQuery, WriteCondition, WriteRequest,
};
pub use traits::{ItemStore, Publisher};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
