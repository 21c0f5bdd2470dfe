//! In-memory [`ItemStore`] implementation backed by [`DashMap`].
//!
//! Each table lives in its own map entry; rows are kept in a `BTreeMap`
//! ordered by the encoded primary key so queries and scans page
//! deterministically. Holding the table entry mutably for the duration of a
//! conditional put makes check-and-write atomic with respect to other
//! writers.
//!
//! The store also carries a couple of test knobs: [`MemoryStore::throttle`]
//! makes batch calls hand back unprocessed requests, and the call counters
//! record how the adapter drove the store.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use itemshape_core::{Item, Value};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::storage::{BatchWriteOutput, Page, ReadQuery, WriteCondition, WriteRequest};
use crate::traits::ItemStore;

/// Separates hash and range components in an encoded primary key.
const KEY_SEPARATOR: char = '\u{1f}';

/// Leads string key components in a row id.
const STRING_TAG: char = 'S';
/// Leads every other key component, which is JSON-encoded after it.
const OTHER_TAG: char = 'N';

struct Table {
    hash_key: String,
    range_key: Option<String>,
    rows: BTreeMap<String, Item>,
}

impl Table {
    /// Tags the component with its kind so `"1"` and `1` stay distinct keys.
    fn encode_value(value: &Value) -> String {
        match value {
            Value::String(s) => format!("{STRING_TAG}{s}"),
            other => format!(
                "{OTHER_TAG}{}",
                serde_json::Value::from(other.clone())
            ),
        }
    }

    fn key_component(&self, item: &Item, attribute: &str) -> Result<String, StoreError> {
        match item.get(attribute) {
            None | Some(Value::Null) => Err(StoreError::InvalidRequest(format!(
                "missing key attribute '{attribute}'"
            ))),
            Some(value) => Ok(Self::encode_value(value)),
        }
    }

    /// Encodes the primary key of `item` into the row id.
    fn row_id(&self, item: &Item) -> Result<String, StoreError> {
        let mut id = self.key_component(item, &self.hash_key)?;
        if let Some(range_key) = &self.range_key {
            id.push(KEY_SEPARATOR);
            id.push_str(&self.key_component(item, range_key)?);
        }
        Ok(id)
    }

    /// Projects `item` down to its primary key attributes.
    fn key_of(&self, item: &Item) -> Item {
        std::iter::once(&self.hash_key)
            .chain(self.range_key.as_ref())
            .filter_map(|attr| item.get(attr).map(|v| (attr.clone(), v.clone())))
            .collect()
    }

    fn read(&self, query: &ReadQuery, use_key_conditions: bool) -> Result<Page, StoreError> {
        let lower = match &query.exclusive_start_key {
            Some(start) => Bound::Excluded(self.row_id(start)?),
            None => Bound::Unbounded,
        };
        let limit = query.limit.unwrap_or(usize::MAX);

        let mut page = Page::default();
        let mut last = None;
        let mut candidates = self
            .rows
            .range::<String, _>((lower, Bound::Unbounded))
            .map(|(_, item)| item)
            .filter(|item| !use_key_conditions || query.matches_key(item))
            .peekable();

        while page.scanned_count < limit {
            let Some(item) = candidates.next() else {
                break;
            };
            page.scanned_count += 1;
            last = Some(item);
            if query.matches_filters(item) {
                page.items.push(item.clone());
            }
        }

        if candidates.peek().is_some() {
            page.last_evaluated_key = last.map(|item| self.key_of(item));
        }
        Ok(page)
    }
}

#[derive(Default)]
struct Throttle {
    remaining_calls: usize,
    unprocessed_per_call: usize,
}

/// In-memory store backed by [`DashMap`].
///
/// Tables must be declared with [`with_table`](Self::with_table) before use;
/// calls against unknown tables fail with [`StoreError::InvalidRequest`].
pub struct MemoryStore {
    tables: DashMap<String, Table>,
    throttle: Mutex<Throttle>,
    batch_calls: Mutex<Vec<usize>>,
    put_calls: AtomicUsize,
}

impl MemoryStore {
    /// Creates a store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            throttle: Mutex::new(Throttle::default()),
            batch_calls: Mutex::new(Vec::new()),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Declares a table and its primary key attributes.
    #[must_use]
    pub fn with_table(self, name: &str, hash_key: &str, range_key: Option<&str>) -> Self {
        self.tables.insert(
            name.to_string(),
            Table {
                hash_key: hash_key.to_string(),
                range_key: range_key.map(str::to_string),
                rows: BTreeMap::new(),
            },
        );
        self
    }

    /// Makes the next `calls` batch writes leave their last
    /// `unprocessed_per_call` requests unapplied.
    pub fn throttle(&self, calls: usize, unprocessed_per_call: usize) {
        *self.throttle.lock() = Throttle {
            remaining_calls: calls,
            unprocessed_per_call,
        };
    }

    /// Request count of every batch write call, in call order.
    #[must_use]
    pub fn batch_calls(&self) -> Vec<usize> {
        self.batch_calls.lock().clone()
    }

    /// Number of single-item puts received, committed or not.
    #[must_use]
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::Relaxed)
    }

    /// Snapshot of every stored item in `table`, in key order.
    #[must_use]
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of items stored in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// Whether `table` holds no items.
    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn unknown_table(table: &str) -> StoreError {
        StoreError::InvalidRequest(format!("unknown table '{table}'"))
    }

    fn take_throttle(&self) -> usize {
        let mut throttle = self.throttle.lock();
        if throttle.remaining_calls == 0 {
            return 0;
        }
        throttle.remaining_calls -= 1;
        throttle.unprocessed_per_call
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let t = self.tables.get(table).ok_or_else(|| Self::unknown_table(table))?;
        let id = t.row_id(key)?;
        Ok(t.rows.get(&id).cloned())
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&WriteCondition>,
    ) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);
        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::unknown_table(table))?;
        let id = t.row_id(&item)?;
        if let Some(condition) = condition {
            if !condition.evaluate(t.rows.get(&id)) {
                debug!(table, attribute = condition.attribute(), "conditional put rejected");
                return Err(StoreError::conditional(format!(
                    "condition on '{}' not met",
                    condition.attribute()
                )));
            }
        }
        t.rows.insert(id, item);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::unknown_table(table))?;
        let id = t.row_id(key)?;
        Ok(t.rows.remove(&id))
    }

    async fn query(&self, table: &str, query: &ReadQuery) -> Result<Page, StoreError> {
        if query.key_conditions.is_empty() {
            return Err(StoreError::InvalidRequest(
                "query requires at least one key condition".into(),
            ));
        }
        let t = self.tables.get(table).ok_or_else(|| Self::unknown_table(table))?;
        t.read(query, true)
    }

    async fn scan(&self, table: &str, query: &ReadQuery) -> Result<Page, StoreError> {
        let t = self.tables.get(table).ok_or_else(|| Self::unknown_table(table))?;
        t.read(query, false)
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, StoreError> {
        if requests.len() > self.max_batch_size() {
            return Err(StoreError::InvalidRequest(format!(
                "batch of {} exceeds the limit of {}",
                requests.len(),
                self.max_batch_size()
            )));
        }
        self.batch_calls.lock().push(requests.len());

        let mut t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::unknown_table(table))?;

        // a malformed request rejects the whole call before anything applies
        let ids = requests
            .iter()
            .map(|request| t.row_id(request.payload()))
            .collect::<Result<Vec<_>, _>>()?;

        let held_back = self.take_throttle().min(requests.len());
        let mut requests = requests;
        let unprocessed = requests.split_off(requests.len() - held_back);

        for (id, request) in ids.into_iter().zip(requests) {
            match request {
                WriteRequest::Put(item) => {
                    t.rows.insert(id, item);
                }
                WriteRequest::Delete(_) => {
                    t.rows.remove(&id);
                }
            }
        }

        Ok(BatchWriteOutput { unprocessed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{key_of, Condition};

    fn store() -> MemoryStore {
        MemoryStore::new().with_table("items", "pk", Some("sk"))
    }

    fn row(pk: &str, sk: &str, name: &str) -> Item {
        let mut item = key_of(&[("pk", pk), ("sk", sk)]);
        item.insert("name".into(), Value::from(name));
        item
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = store();
        store.put_item("items", row("1", "a", "first"), None).await.unwrap();

        let key = key_of(&[("pk", "1"), ("sk", "a")]);
        let fetched = store.get_item("items", &key).await.unwrap();
        assert_eq!(fetched, Some(row("1", "a", "first")));

        let removed = store.delete_item("items", &key).await.unwrap();
        assert_eq!(removed, Some(row("1", "a", "first")));
        assert!(store.get_item("items", &key).await.unwrap().is_none());
        assert!(store.is_empty("items"));
    }

    #[tokio::test]
    async fn conditional_put_rejects_existing_item() {
        let store = store();
        let cond = WriteCondition::AttributeNotExists {
            attribute: "pk".into(),
        };
        store
            .put_item("items", row("1", "a", "first"), Some(&cond))
            .await
            .unwrap();

        let err = store
            .put_item("items", row("1", "a", "second"), Some(&cond))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionalCheckFailed { .. }));
        assert_eq!(store.items("items"), vec![row("1", "a", "first")]);
        assert_eq!(store.put_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_table_and_missing_key_are_invalid() {
        let store = store();
        let err = store.get_item("nope", &Item::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));

        let err = store
            .put_item("items", key_of(&[("pk", "1")]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn query_pages_in_key_order() {
        let store = store();
        for sk in ["c", "a", "b", "d"] {
            store.put_item("items", row("1", sk, sk), None).await.unwrap();
        }
        store.put_item("items", row("2", "a", "other"), None).await.unwrap();

        let query = ReadQuery::new().key(Condition::equals("pk", "1")).limit(3);
        let first = store.query("items", &query).await.unwrap();
        let names: Vec<_> = first.items.iter().map(|i| i["sk"].clone()).collect();
        assert_eq!(names, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(
            first.last_evaluated_key,
            Some(key_of(&[("pk", "1"), ("sk", "c")]))
        );

        let next = query.clone().start_after(first.last_evaluated_key.unwrap());
        let second = store.query("items", &next).await.unwrap();
        assert_eq!(second.items, vec![row("1", "d", "d")]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn scan_applies_filters_after_limit() {
        let store = store();
        store.put_item("items", row("1", "a", "keep"), None).await.unwrap();
        store.put_item("items", row("1", "b", "drop"), None).await.unwrap();
        store.put_item("items", row("1", "c", "keep"), None).await.unwrap();

        let query = ReadQuery::new()
            .filter(Condition::equals("name", "keep"))
            .limit(2);
        let page = store.scan("items", &query).await.unwrap();
        assert_eq!(page.items, vec![row("1", "a", "keep")]);
        assert_eq!(page.scanned_count, 2);
        assert!(page.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn query_without_key_condition_is_rejected() {
        let err = store().query("items", &ReadQuery::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn throttled_batch_returns_unprocessed_tail() {
        let store = store();
        store.throttle(1, 2);
        let requests: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|sk| WriteRequest::Put(row("1", sk, sk)))
            .collect();

        let out = store.batch_write("items", requests).await.unwrap();
        assert_eq!(out.unprocessed.len(), 2);
        assert_eq!(store.len("items"), 1);

        let out = store.batch_write("items", out.unprocessed).await.unwrap();
        assert!(out.unprocessed.is_empty());
        assert_eq!(store.len("items"), 3);
        assert_eq!(store.batch_calls(), vec![3, 2]);
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let store = store();
        let requests: Vec<_> = (0..26)
            .map(|i| WriteRequest::Put(row("1", &i.to_string(), "x")))
            .collect();
        let err = store.batch_write("items", requests).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
        assert!(store.batch_calls().is_empty());
    }

    #[tokio::test]
    async fn batch_with_a_keyless_request_applies_nothing() {
        let store = store();
        let requests = vec![
            WriteRequest::Put(row("1", "a", "first")),
            WriteRequest::Put(key_of(&[("pk", "1")])),
        ];

        let err = store.batch_write("items", requests).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
        assert!(store.is_empty("items"));
    }

    #[tokio::test]
    async fn keys_of_different_types_do_not_collide() {
        let store = MemoryStore::new().with_table("numbers", "id", None);
        let mut text = Item::new();
        text.insert("id".into(), Value::from("1"));
        text.insert("kind".into(), Value::from("text"));
        let mut number = Item::new();
        number.insert("id".into(), Value::Int(1));
        number.insert("kind".into(), Value::from("number"));

        store.put_item("numbers", text.clone(), None).await.unwrap();
        store.put_item("numbers", number.clone(), None).await.unwrap();

        assert_eq!(store.len("numbers"), 2);
        let fetched = store
            .get_item("numbers", &key_of(&[("id", "1")]))
            .await
            .unwrap();
        assert_eq!(fetched, Some(text));
    }
}
