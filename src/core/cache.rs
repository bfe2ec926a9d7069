//! Session-lifetime cache of remote collections
//!
//! Each collection is snapshotted by one full `list_all` and afterwards only
//! changes through local removals and field patches applied after a
//! confirmed remote write. Newly created remote records are never
//! discovered; a forced reload is the only way to pick them up.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::record::{Item, Notification, Record, User};
use crate::core::store::{RemoteStore, StoreError};

/// Ordered snapshot of one collection; every id appears at most once
#[derive(Debug, Clone)]
pub struct CollectionCache<R: Record> {
    records: Vec<R>,
}

impl<R: Record> Default for CollectionCache<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: Record> CollectionCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from already-decoded records, dropping repeated ids
    pub fn from_records(records: impl IntoIterator<Item = R>) -> Self {
        let mut cache = Self::new();
        cache.replace(records.into_iter().collect());
        cache
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Fetch the collection if nothing is cached yet
    ///
    /// Returns `true` when a fetch happened. On failure the cache is untouched.
    pub fn ensure_loaded(&mut self, store: &dyn RemoteStore) -> Result<bool, StoreError> {
        if !self.records.is_empty() {
            debug!(collection = %R::COLLECTION, "cache already populated");
            return Ok(false);
        }
        self.reload(store)?;
        Ok(true)
    }

    /// Unconditionally replace the snapshot with a fresh fetch
    ///
    /// The snapshot is swapped only after every document decoded, so a
    /// failure never leaves partial results behind.
    pub fn reload(&mut self, store: &dyn RemoteStore) -> Result<(), StoreError> {
        let documents = store.list_all(R::COLLECTION)?;
        let records = documents
            .into_iter()
            .map(|doc| {
                let id = doc.id.clone();
                R::from_document(doc).map_err(|e| {
                    StoreError::Decode(format!("{}/{}: {}", R::COLLECTION, id, e))
                })
            })
            .collect::<Result<Vec<R>, StoreError>>()?;
        self.replace(records);
        debug!(collection = %R::COLLECTION, count = self.records.len(), "cache loaded");
        Ok(())
    }

    fn replace(&mut self, records: Vec<R>) {
        let mut unique: Vec<R> = Vec::with_capacity(records.len());
        for record in records {
            if unique.iter().any(|r| r.id() == record.id()) {
                warn!(collection = %R::COLLECTION, id = record.id(), "duplicate id in snapshot, keeping first");
                continue;
            }
            unique.push(record);
        }
        self.records = unique;
    }

    /// Remove the record with `id`; absent ids are a no-op
    pub fn remove(&mut self, id: &str) -> Option<R> {
        let pos = self.records.iter().position(|r| r.id() == id)?;
        Some(self.records.remove(pos))
    }

    /// Remove every record matching `pred`, returning how many went
    pub fn remove_where(&mut self, mut pred: impl FnMut(&R) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !pred(r));
        before - self.records.len()
    }

    /// Merge `fields` into the record with `id` in place; absent ids are a no-op
    ///
    /// Returns whether a record was patched.
    pub fn patch(&mut self, id: &str, fields: &Map<String, Value>) -> Result<bool, serde_json::Error> {
        let Some(record) = self.records.iter_mut().find(|r| r.id() == id) else {
            return Ok(false);
        };
        *record = record.patched(fields)?;
        Ok(true)
    }
}

/// All collection caches for one admin session
#[derive(Debug, Default, Clone)]
pub struct LocalCache {
    pub items: CollectionCache<Item>,
    pub users: CollectionCache<User>,
    pub notifications: CollectionCache<Notification>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached items whose `userId` is `user_id`
    pub fn item_count_for(&self, user_id: &str) -> usize {
        self.items
            .records()
            .iter()
            .filter(|i| i.user_id.as_deref() == Some(user_id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Collection;
    use crate::core::store::{FailOn, MemoryStore};
    use serde_json::json;

    fn store_with_items() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_json(Collection::Items, "a", json!({"building": "อาคาร 1"}));
        store.insert_json(Collection::Items, "b", json!({"building": "อาคาร 2"}));
        store
    }

    #[test]
    fn test_ensure_loaded_fetches_once() {
        let store = store_with_items();
        let mut cache: CollectionCache<Item> = CollectionCache::new();

        assert!(cache.ensure_loaded(&store).unwrap());
        assert!(!cache.ensure_loaded(&store).unwrap());
        assert_eq!(store.list_calls(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_ensure_loaded_refetches_empty_collection() {
        let store = MemoryStore::new();
        let mut cache: CollectionCache<User> = CollectionCache::new();
        cache.ensure_loaded(&store).unwrap();
        cache.ensure_loaded(&store).unwrap();
        assert_eq!(store.list_calls(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_prior_state() {
        let store = store_with_items();
        let mut cache: CollectionCache<Item> = CollectionCache::new();
        cache.ensure_loaded(&store).unwrap();

        store.insert_json(Collection::Items, "c", json!({}));
        store.fail(FailOn::List, Collection::Items, None);
        assert!(cache.reload(&store).is_err());
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("c"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = store_with_items();
        let mut cache: CollectionCache<Item> = CollectionCache::new();
        cache.ensure_loaded(&store).unwrap();

        assert!(cache.remove("a").is_some());
        let once: Vec<String> = cache.records().iter().map(|i| i.id.clone()).collect();
        assert!(cache.remove("a").is_none());
        let twice: Vec<String> = cache.records().iter().map(|i| i.id.clone()).collect();
        assert_eq!(once, twice);
        assert_eq!(once, ["b"]);
    }

    #[test]
    fn test_patch_in_place() {
        let mut cache = CollectionCache::from_records([User::new("u1"), User::new("u2")]);
        let mut fields = Map::new();
        fields.insert("role".into(), json!("admin"));

        assert!(cache.patch("u2", &fields).unwrap());
        assert!(!cache.patch("ghost", &fields).unwrap());
        assert_eq!(cache.get("u2").unwrap().role.as_deref(), Some("admin"));
        assert_eq!(cache.get("u1").unwrap().role, None);
        assert_eq!(cache.records()[1].id, "u2");
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let mut first = Item::new("a");
        first.title = Some("first".into());
        let mut second = Item::new("a");
        second.title = Some("second".into());

        let cache = CollectionCache::from_records([first, second, Item::new("b")]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().title.as_deref(), Some("first"));
    }

    #[test]
    fn test_item_count_for_user() {
        let mut mine = Item::new("a");
        mine.user_id = Some("u1".into());
        let mut cache = LocalCache::new();
        cache.items = CollectionCache::from_records([mine, Item::new("b")]);
        assert_eq!(cache.item_count_for("u1"), 1);
        assert_eq!(cache.item_count_for("u2"), 0);
    }
}
