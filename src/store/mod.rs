//! Record store boundary.
//!
//! Records are untyped JSON objects at this layer. The engine interprets the
//! fields it needs (see `records.rs`) and tolerates everything else.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One stored row.
pub type Record = Map<String, Value>;

/// Errors specific to record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Malformed record body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Field-equality predicates, AND-combined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    equals: Vec<(String, Value)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

pub trait RecordStore {
    fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Insert a record. The store assigns an `id` when the record has none and
    /// returns the record as stored.
    fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Shallow-merge `patch` into the stored record.
    fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<(), StoreError>;

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        (**self).fetch_all(collection, filter)
    }

    fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        (**self).insert(collection, record)
    }

    fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<(), StoreError> {
        (**self).update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        (**self).delete(collection, id)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        (**self).fetch_all(collection, filter)
    }

    fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        (**self).insert(collection, record)
    }

    fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<(), StoreError> {
        (**self).update(collection, id, patch)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        (**self).delete(collection, id)
    }
}

/// Read the `id` field of a record, if it is a non-empty string.
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Ensure the record carries an id, generating a UUID v4 when missing.
pub(crate) fn assign_id(record: &mut Record) -> String {
    if let Some(id) = record_id(record) {
        return id.to_string();
    }
    let id = uuid::Uuid::new_v4().to_string();
    record.insert("id".to_string(), Value::String(id.clone()));
    id
}
