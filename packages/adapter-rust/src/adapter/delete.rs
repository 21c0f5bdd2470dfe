use itemshape_core::Item;

use super::{DeleteOptions, StoreAdapter};
use crate::error::AdapterError;
use crate::notify::EventKind;

impl StoreAdapter {
    /// Deletes the item with primary key `key`.
    ///
    /// Returns the removed item's attributes with prefixes stripped, or
    /// `None` if nothing was stored under the key. A `delete` notification
    /// carrying the stripped key is published either way.
    ///
    /// # Errors
    ///
    /// Store failures, timeouts, and [`AdapterError::Notification`] when the
    /// delete committed but could not be published.
    pub async fn delete(
        &self,
        key: &Item,
        options: &DeleteOptions,
    ) -> Result<Option<Item>, AdapterError> {
        self.observe("delete", async {
            let prefixer = self.prefixer_for(&options.prefixes);
            let prefixed = prefixer.apply(&self.key_of(key));
            let removed = self
                .bounded(self.store.delete_item(self.table(), &prefixed))
                .await?;

            self.notifier
                .publish(EventKind::Delete, &prefixer.strip(&prefixed), &options.publish)
                .await?;
            Ok(removed.map(|item| prefixer.strip(&item)))
        })
        .await
    }
}
