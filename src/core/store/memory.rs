//! In-process document store
//!
//! Backs the scenario tests: documents live in ordered per-collection maps,
//! individual operations can be made to fail, and every call is counted.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::core::record::Collection;

use super::{Document, RemoteStore, StoreError};

/// Which operation a scripted failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    List,
    Delete,
    Update,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RefCell<BTreeMap<Collection, Vec<Document>>>,
    failures: RefCell<HashSet<(FailOn, Collection, Option<String>)>>,
    list_calls: Cell<usize>,
    write_calls: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document, keeping insertion order for new ids
    pub fn insert(&self, collection: Collection, doc: Document) {
        let mut collections = self.collections.borrow_mut();
        let docs = collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
    }

    /// Convenience for tests: insert a document from a JSON object literal
    pub fn insert_json(&self, collection: Collection, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.insert(collection, Document::new(id, fields));
    }

    /// Make `op` fail for one document id, or for the whole collection when `id` is `None`
    pub fn fail(&self, op: FailOn, collection: Collection, id: Option<&str>) {
        self.failures
            .borrow_mut()
            .insert((op, collection, id.map(str::to_string)));
    }

    pub fn contains(&self, collection: Collection, id: &str) -> bool {
        self.collections
            .borrow()
            .get(&collection)
            .is_some_and(|docs| docs.iter().any(|d| d.id == id))
    }

    pub fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.collections
            .borrow()
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned())
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .borrow()
            .get(&collection)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Number of `list_all` calls served
    pub fn list_calls(&self) -> usize {
        self.list_calls.get()
    }

    /// Number of delete/update calls attempted
    pub fn write_calls(&self) -> usize {
        self.write_calls.get()
    }

    fn check(&self, op: FailOn, collection: Collection, id: Option<&str>) -> Result<(), StoreError> {
        let failures = self.failures.borrow();
        let failing = failures.contains(&(op, collection, None))
            || id.is_some_and(|id| failures.contains(&(op, collection, Some(id.to_string()))));
        if failing {
            return Err(StoreError::Remote {
                status: 503,
                message: format!("injected {:?} failure on {}", op, collection),
            });
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.list_calls.set(self.list_calls.get() + 1);
        self.check(FailOn::List, collection, None)?;
        Ok(self
            .collections
            .borrow()
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.document(collection, id))
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.write_calls.set(self.write_calls.get() + 1);
        self.check(FailOn::Delete, collection, Some(id))?;
        if let Some(docs) = self.collections.borrow_mut().get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        self.write_calls.set(self.write_calls.get() + 1);
        self.check(FailOn::Update, collection, Some(id))?;
        let mut collections = self.collections.borrow_mut();
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;
        for (key, value) in fields {
            doc.fields.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
