use itemshape_core::{merge, Item, KeyPrefixer};
use tracing::debug;

use super::{StoreAdapter, UpdateOptions};
use crate::error::{AdapterError, StoreError};
use crate::idempotence::{stored_is_newer, ConflictToken};
use crate::notify::EventKind;
use crate::storage::{Lookup, ReadOperation};

/// Fetch-and-write rounds a prefer-latest update makes before giving up on
/// an item that keeps changing underneath it.
const PREFER_LATEST_ATTEMPTS: usize = 3;

impl StoreAdapter {
    /// Merges `data` onto the item found by `lookup` and writes the result.
    ///
    /// With an idempotence attribute configured the write is conditional on
    /// the attribute still holding the value read at fetch time. In
    /// prefer-latest mode the newer of the stored and incoming values wins
    /// instead: a stored value newer than the incoming one makes the update a
    /// no-op that returns the stored item, and a lost race re-reads the item
    /// and compares again.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::NotFound`] if `lookup` finds nothing
    /// - [`AdapterError::MissingIdempotenceKey`] if the fetched item lacks
    ///   the idempotence attribute (nothing is written)
    /// - [`AdapterError::InvalidIdempotenceValue`] in prefer-latest mode when
    ///   the values are not comparable timestamps
    /// - [`AdapterError::IdempotenceConflict`] on a lost race with
    ///   `raise_on_conflict`, otherwise the store's
    ///   [`StoreError::ConditionalCheckFailed`] unchanged. In prefer-latest
    ///   mode this only happens once every attempt has lost.
    /// - [`AdapterError::Notification`] if the write committed but could not
    ///   be published
    pub async fn update(
        &self,
        data: &Item,
        lookup: &Lookup,
        options: &UpdateOptions,
    ) -> Result<Item, AdapterError> {
        self.observe("update", async {
            let prefixer = self.prefixer_for(&options.prefixes);
            let use_latest = options
                .use_latest
                .unwrap_or(self.config.idempotence.use_latest);
            let raise_on_conflict = options
                .raise_on_conflict
                .unwrap_or(self.config.idempotence.raise_on_conflict);
            let policy = options
                .list_policy
                .unwrap_or(self.config.list_merge_policy);

            let mut attempt = 1;
            loop {
                let original = self.fetch_original(lookup, &prefixer).await?;
                let token = match &self.config.idempotence.attribute {
                    Some(attribute) => Some(ConflictToken::read(&original, attribute)?),
                    None => None,
                };

                let merged = merge(&original, data, policy);
                let payload = self
                    .mapper
                    .map(&merged, self.schema_for(options.schema.as_deref()))?;

                if let Some(token) = token.as_ref().filter(|_| use_latest) {
                    let incoming = payload.get(&token.attribute).unwrap_or(&token.value);
                    if stored_is_newer(&token.attribute, &token.value, incoming)? {
                        debug!(
                            attribute = %token.attribute,
                            "stored item is newer, skipping write"
                        );
                        return Ok(original);
                    }
                }

                let stored = prefixer.apply(&payload);
                let condition = token.as_ref().map(ConflictToken::unchanged);
                let result = self
                    .bounded(
                        self.store
                            .put_item(self.table(), stored.clone(), condition.as_ref()),
                    )
                    .await;

                let source = match result {
                    Ok(()) => {
                        let updated = prefixer.strip(&stored);
                        self.notifier
                            .publish(EventKind::Update, &updated, &options.publish)
                            .await?;
                        return Ok(updated);
                    }
                    Err(AdapterError::Store(
                        source @ StoreError::ConditionalCheckFailed { .. },
                    )) => source,
                    Err(e) => return Err(e),
                };

                if use_latest && attempt < PREFER_LATEST_ATTEMPTS {
                    debug!(attempt, "idempotence value changed concurrently, re-reading");
                    attempt += 1;
                    continue;
                }
                return Err(match token {
                    Some(token) if raise_on_conflict => AdapterError::IdempotenceConflict {
                        attribute: token.attribute,
                        source,
                    },
                    _ => AdapterError::Store(source),
                });
            }
        })
        .await
    }

    /// Loads the item an update starts from, with prefixes stripped.
    async fn fetch_original(
        &self,
        lookup: &Lookup,
        prefixer: &KeyPrefixer,
    ) -> Result<Item, AdapterError> {
        let found = match lookup {
            Lookup::Key(key) => {
                self.bounded(self.store.get_item(self.table(), &prefixer.apply(key)))
                    .await?
            }
            Lookup::Query(query) => self
                .fetch_page(ReadOperation::Query, query, prefixer)
                .await?
                .items
                .into_iter()
                .next(),
        };
        match found {
            Some(item) if !item.is_empty() => Ok(prefixer.strip(&item)),
            _ => Err(AdapterError::NotFound),
        }
    }
}
