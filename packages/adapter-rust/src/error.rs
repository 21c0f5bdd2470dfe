//! Error taxonomy for the adapter and its store collaborator.

use itemshape_core::Item;

/// Errors reported by an [`ItemStore`](crate::traits::ItemStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A conditional write was rejected because its predicate did not hold.
    #[error("conditional check failed: {message}")]
    ConditionalCheckFailed { message: String },
    /// The store could not serve the request (throttled, unreachable, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The request was malformed for this store (unknown table, missing key, ...).
    #[error("invalid store request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// Shorthand for a [`StoreError::ConditionalCheckFailed`].
    #[must_use]
    pub fn conditional(message: impl Into<String>) -> Self {
        Self::ConditionalCheckFailed {
            message: message.into(),
        }
    }
}

/// Errors returned by [`StoreAdapter`](crate::adapter::StoreAdapter) operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The fetch that precedes an update found nothing.
    #[error("no item found to update")]
    NotFound,
    /// An insert-if-absent write found an existing item.
    #[error("item already exists in table '{table}'")]
    ConditionalWrite {
        table: String,
        #[source]
        source: StoreError,
    },
    /// The optimistic-concurrency token changed between fetch and write and
    /// the caller asked for an explicit error.
    #[error("idempotence key '{attribute}' changed since the item was read")]
    IdempotenceConflict {
        attribute: String,
        #[source]
        source: StoreError,
    },
    /// The configured idempotence attribute is absent on the fetched item.
    #[error("idempotence key '{attribute}' not found in original item")]
    MissingIdempotenceKey { attribute: String },
    /// Prefer-latest resolution needs timestamp-comparable values.
    #[error("idempotence key '{attribute}' has a value that is not a comparable timestamp: {value}")]
    InvalidIdempotenceValue { attribute: String, value: String },
    /// A schema name did not resolve against the schema source.
    #[error("schema '{name}' not found")]
    SchemaNotFound { name: String },
    /// Malformed batch input, or items that never succeeded after retries.
    #[error("batch write failed: {message}")]
    BatchItem { message: String, failed: Vec<Item> },
    /// The write committed but its notification could not be dispatched.
    #[error("{operation} committed but its notification failed to publish")]
    Notification {
        operation: &'static str,
        committed: Box<Item>,
        #[source]
        source: anyhow::Error,
    },
    /// A store call exceeded the configured operation timeout.
    #[error("store call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The adapter configuration is unusable.
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdapterError {
    /// Whether this error stems from a store-side conditional check, in any
    /// of the forms the adapter surfaces it.
    #[must_use]
    pub fn is_conditional_failure(&self) -> bool {
        matches!(
            self,
            AdapterError::ConditionalWrite { .. }
                | AdapterError::IdempotenceConflict { .. }
                | AdapterError::Store(StoreError::ConditionalCheckFailed { .. })
        )
    }

    pub(crate) fn batch(message: impl Into<String>) -> Self {
        AdapterError::BatchItem {
            message: message.into(),
            failed: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_failures_are_recognized() {
        let native = AdapterError::Store(StoreError::conditional("modified mismatch"));
        assert!(native.is_conditional_failure());

        let create = AdapterError::ConditionalWrite {
            table: "t".into(),
            source: StoreError::conditional("exists"),
        };
        assert!(create.is_conditional_failure());

        assert!(!AdapterError::NotFound.is_conditional_failure());
        assert!(!AdapterError::Store(StoreError::Unavailable("x".into())).is_conditional_failure());
    }

    #[test]
    fn messages_name_the_offending_attribute() {
        let err = AdapterError::MissingIdempotenceKey {
            attribute: "modified".into(),
        };
        assert_eq!(
            err.to_string(),
            "idempotence key 'modified' not found in original item"
        );

        let err = AdapterError::SchemaNotFound {
            name: "widget".into(),
        };
        assert_eq!(err.to_string(), "schema 'widget' not found");
    }

    #[test]
    fn store_errors_convert_transparently() {
        let err: AdapterError = StoreError::InvalidRequest("unknown table".into()).into();
        assert_eq!(err.to_string(), "invalid store request: unknown table");
    }
}
