//! Remote document store interface
//!
//! The admin core talks to the hosted document database only through
//! [`RemoteStore`]. Documents cross this boundary as plain JSON field maps;
//! wire encodings stay inside the concrete clients.

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::{FailOn, MemoryStore};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::record::Collection;

/// A raw document: id plus field map
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Errors that can occur talking to the remote store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Not signed in or session expired")]
    Unauthenticated,

    #[error("Remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Operations the admin core needs from the document database
pub trait RemoteStore {
    /// Fetch every document in a collection
    fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Fetch a single document, `None` if it does not exist
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Delete a document
    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Overwrite only the given fields of an existing document
    fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        (**self).list_all(collection)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).get(collection, id)
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        (**self).delete(collection, id)
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        (**self).update_fields(collection, id, fields)
    }
}
