//! Chunked batch writes with bounded retries of unprocessed requests.
//!
//! Chunks are written sequentially and independently: a chunk that keeps
//! reporting unprocessed requests does not stop later chunks, and nothing
//! already committed is rolled back. Retries resend exactly the leftover
//! requests the store handed back, which were prefixed and mapped once up
//! front.

use std::time::Duration;

use itemshape_core::{Item, KeyPrefixer, Value};
use rand::Rng;
use tracing::{debug, warn};

use super::{BatchOptions, StoreAdapter};
use crate::error::AdapterError;
use crate::storage::WriteRequest;

/// What a successful batch call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Requests the store applied.
    pub written: usize,
    /// Chunks sent (first attempts only).
    pub chunks: usize,
    /// Retry calls made for unprocessed requests.
    pub retries: usize,
}

/// Interprets a dynamic value as a batch of items.
///
/// # Errors
///
/// Returns [`AdapterError::BatchItem`] unless `value` is a list whose every
/// element is a mapping.
pub fn batch_items_from_value(value: Value) -> Result<Vec<Item>, AdapterError> {
    let Value::List(elements) = value else {
        return Err(AdapterError::batch(
            "batched data must be contained within a list",
        ));
    };
    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match element {
            Value::Map(item) => Ok(item),
            other => Err(AdapterError::batch(format!(
                "batch element {index} is a {}, expected a mapping",
                other.kind()
            ))),
        })
        .collect()
}

/// Adds up to half of `delay` again as random jitter, never exceeding `cap`.
fn jittered(delay: Duration, cap: Duration) -> Duration {
    let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return delay.min(cap);
    }
    let extra = rand::rng().random_range(0..=millis / 2);
    Duration::from_millis(millis.saturating_add(extra)).min(cap)
}

impl StoreAdapter {
    /// Stores `items` unconditionally in chunks of at most `batch_size`.
    ///
    /// Every item is prefixed and mapped before the first store call, so a
    /// schema error fails the whole batch without writing anything. Batch
    /// writes do not publish notifications.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::BatchItem`] for an out-of-range batch size, or
    ///   listing the items (prefixes stripped) still unprocessed after the
    ///   retry budget
    /// - [`AdapterError::SchemaNotFound`] for an unresolvable schema
    /// - store failures and timeouts, which abort the remaining chunks
    pub async fn batch_insert(
        &self,
        items: &[Item],
        options: &BatchOptions,
    ) -> Result<BatchSummary, AdapterError> {
        self.observe("batch_insert", async {
            let batch_size = self.batch_size(options)?;
            let prefixer = self.prefixer_for(&options.prefixes);
            let schema = self.schema_for(options.schema.as_deref());
            let requests = items
                .iter()
                .map(|item| {
                    let mapped = self.mapper.map(&prefixer.apply(item), schema)?;
                    Ok(WriteRequest::Put(mapped))
                })
                .collect::<Result<Vec<_>, AdapterError>>()?;
            self.write_chunks(requests, batch_size, &prefixer).await
        })
        .await
    }

    /// Deletes the items keyed by `keys` in chunks of at most `batch_size`.
    ///
    /// Full items may be passed; only their key attributes are sent.
    ///
    /// # Errors
    ///
    /// As [`batch_insert`](Self::batch_insert), minus schema errors.
    pub async fn batch_delete(
        &self,
        keys: &[Item],
        options: &BatchOptions,
    ) -> Result<BatchSummary, AdapterError> {
        self.observe("batch_delete", async {
            let batch_size = self.batch_size(options)?;
            let prefixer = self.prefixer_for(&options.prefixes);
            let requests = keys
                .iter()
                .map(|key| WriteRequest::Delete(prefixer.apply(&self.key_of(key))))
                .collect();
            self.write_chunks(requests, batch_size, &prefixer).await
        })
        .await
    }

    fn batch_size(&self, options: &BatchOptions) -> Result<usize, AdapterError> {
        let size = options.batch_size.unwrap_or(self.config.max_batch_size);
        let limit = self.store.max_batch_size();
        if size == 0 || size > limit {
            return Err(AdapterError::batch(format!(
                "batch size {size} must be between 1 and {limit}"
            )));
        }
        Ok(size)
    }

    async fn write_chunks(
        &self,
        requests: Vec<WriteRequest>,
        batch_size: usize,
        prefixer: &KeyPrefixer,
    ) -> Result<BatchSummary, AdapterError> {
        let total = requests.len();
        let mut summary = BatchSummary::default();
        let mut failed = Vec::new();
        let mut rest = requests;

        while !rest.is_empty() {
            let tail = rest.split_off(batch_size.min(rest.len()));
            let chunk = std::mem::replace(&mut rest, tail);
            let sent = chunk.len();
            summary.chunks += 1;
            debug!(chunk = summary.chunks, size = sent, "writing batch chunk");

            let (leftover, retries) = self.write_chunk(chunk).await?;
            summary.retries += retries;
            summary.written += sent - leftover.len();
            failed.extend(leftover);
        }

        if failed.is_empty() {
            return Ok(summary);
        }
        Err(AdapterError::BatchItem {
            message: format!(
                "{} of {total} items still unprocessed after {} retries",
                failed.len(),
                self.config.retry.max_retries
            ),
            failed: failed
                .into_iter()
                .map(|request| prefixer.strip(request.payload()))
                .collect(),
        })
    }

    /// Writes one chunk, retrying unprocessed requests with backoff.
    ///
    /// Returns the requests that never went through and the number of
    /// retries made.
    async fn write_chunk(
        &self,
        chunk: Vec<WriteRequest>,
    ) -> Result<(Vec<WriteRequest>, usize), AdapterError> {
        let policy = &self.config.retry;
        let mut pending = chunk;
        let mut attempt = 0;

        loop {
            let output = self
                .bounded(self.store.batch_write(self.table(), pending))
                .await?;
            if output.unprocessed.is_empty() {
                return Ok((Vec::new(), attempt));
            }
            if attempt >= policy.max_retries {
                warn!(
                    unprocessed = output.unprocessed.len(),
                    retries = attempt,
                    "batch retries exhausted"
                );
                return Ok((output.unprocessed, attempt));
            }

            let delay = jittered(
                policy.delay(attempt),
                Duration::from_millis(policy.max_delay_ms),
            );
            debug!(
                unprocessed = output.unprocessed.len(),
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying unprocessed batch requests"
            );
            tokio::time::sleep(delay).await;
            pending = output.unprocessed;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_input_must_be_a_list_of_mappings() {
        let err = batch_items_from_value(Value::from("not a list")).unwrap_err();
        assert!(matches!(err, AdapterError::BatchItem { ref failed, .. } if failed.is_empty()));

        let err = batch_items_from_value(Value::List(vec![Value::Int(1)])).unwrap_err();
        assert!(err.to_string().contains("batch element 0"));

        let items = batch_items_from_value(Value::List(vec![Value::Map(Item::new())])).unwrap();
        assert_eq!(items, vec![Item::new()]);
    }

    #[test]
    fn jitter_stays_within_half_again() {
        let cap = Duration::from_secs(10);
        assert_eq!(jittered(Duration::ZERO, cap), Duration::ZERO);
        for _ in 0..50 {
            let d = jittered(Duration::from_millis(100), cap);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn jitter_never_exceeds_the_delay_cap() {
        let policy = crate::config::RetryPolicy::default();
        let cap = Duration::from_millis(policy.max_delay_ms);
        for attempt in 0..10 {
            for _ in 0..20 {
                assert!(jittered(policy.delay(attempt), cap) <= cap);
            }
        }
        // a delay already at the cap gets no jitter on top
        assert_eq!(jittered(cap, cap), cap);
    }
}
