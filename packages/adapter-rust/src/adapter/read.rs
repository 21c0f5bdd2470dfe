use itemshape_core::{Item, KeyPrefixer};

use super::{ReadOptions, StoreAdapter};
use crate::error::AdapterError;
use crate::storage::{Page, ReadOperation, ReadQuery};

impl StoreAdapter {
    /// Fetches one item by primary key.
    ///
    /// With `raw` the store's item is returned untouched; otherwise key
    /// prefixes are stripped and the item is mapped to the schema, if any.
    ///
    /// # Errors
    ///
    /// Store failures, timeouts, and [`AdapterError::SchemaNotFound`].
    pub async fn get(&self, key: &Item, options: &ReadOptions) -> Result<Option<Item>, AdapterError> {
        self.observe("get", async {
            let prefixer = self.prefixer_for(&options.prefixes);
            let item = self
                .bounded(self.store.get_item(self.table(), &prefixer.apply(key)))
                .await?;
            match item {
                Some(item) if !options.raw => Ok(Some(self.clean(&prefixer, &item, options)?)),
                other => Ok(other),
            }
        })
        .await
    }

    /// Runs a query or scan with prefixed key values.
    ///
    /// Post-processing matches [`get`](Self::get), applied to every returned
    /// item and to the last evaluated key.
    ///
    /// # Errors
    ///
    /// Store failures, timeouts, and [`AdapterError::SchemaNotFound`].
    pub async fn read(
        &self,
        operation: ReadOperation,
        query: &ReadQuery,
        options: &ReadOptions,
    ) -> Result<Page, AdapterError> {
        self.observe(operation.as_str(), async {
            let prefixer = self.prefixer_for(&options.prefixes);
            let page = self.fetch_page(operation, query, &prefixer).await?;
            if options.raw {
                return Ok(page);
            }
            let items = page
                .items
                .iter()
                .map(|item| self.clean(&prefixer, item, options))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page {
                items,
                last_evaluated_key: page.last_evaluated_key.map(|key| prefixer.strip(&key)),
                scanned_count: page.scanned_count,
            })
        })
        .await
    }

    /// Shorthand for [`read`](Self::read) with [`ReadOperation::Query`].
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn query(&self, query: &ReadQuery, options: &ReadOptions) -> Result<Page, AdapterError> {
        self.read(ReadOperation::Query, query, options).await
    }

    /// Shorthand for [`read`](Self::read) with [`ReadOperation::Scan`].
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub async fn scan(&self, query: &ReadQuery, options: &ReadOptions) -> Result<Page, AdapterError> {
        self.read(ReadOperation::Scan, query, options).await
    }

    /// Issues the store call for a read, without post-processing.
    pub(super) async fn fetch_page(
        &self,
        operation: ReadOperation,
        query: &ReadQuery,
        prefixer: &KeyPrefixer,
    ) -> Result<Page, AdapterError> {
        let prefixed = query.with_prefixed_keys(prefixer);
        match operation {
            ReadOperation::Query => self.bounded(self.store.query(self.table(), &prefixed)).await,
            ReadOperation::Scan => self.bounded(self.store.scan(self.table(), &prefixed)).await,
        }
    }

    fn clean(
        &self,
        prefixer: &KeyPrefixer,
        item: &Item,
        options: &ReadOptions,
    ) -> Result<Item, AdapterError> {
        self.mapper.map(
            &prefixer.strip(item),
            self.schema_for(options.schema.as_deref()),
        )
    }
}
