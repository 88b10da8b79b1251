//! In-process record store. Insertion order is preserved per collection.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{assign_id, record_id, Record, RecordFilter, RecordStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    failing_ids: Mutex<HashSet<String>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection without counting the inserts as writes.
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Record>) {
        let mut guard = self.collections.lock();
        let rows = guard.entry(collection.to_string()).or_default();
        for mut record in records {
            assign_id(&mut record);
            rows.push(record);
        }
    }

    /// Make every subsequent write touching `id` fail with `Unavailable`.
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.lock().insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_ids.lock().clear();
    }

    /// Number of successful insert/update/delete calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    /// Snapshot of one stored record.
    pub fn get(&self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|rows| rows.iter().find(|r| record_id(r) == Some(id)).cloned())
    }

    fn check_failure(&self, id: &str) -> Result<(), StoreError> {
        if self.failing_ids.lock().contains(id) {
            return Err(StoreError::Unavailable(format!("write to {id} rejected")));
        }
        Ok(())
    }

    fn count_write(&self) {
        *self.writes.lock() += 1;
    }
}

impl RecordStore for MemoryStore {
    fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        let guard = self.collections.lock();
        let rows = match guard.get(collection) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        Ok(rows
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(r)))
            .cloned()
            .collect())
    }

    fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let id = assign_id(&mut record);
        self.check_failure(&id)?;
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        self.count_write();
        Ok(record)
    }

    fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<(), StoreError> {
        self.check_failure(id)?;
        let mut guard = self.collections.lock();
        let row = guard
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in patch {
            if key != "id" {
                row.insert(key.clone(), value.clone());
            }
        }
        drop(guard);
        self.count_write();
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_failure(id)?;
        let mut guard = self.collections.lock();
        let rows = guard.get_mut(collection);
        let removed = match rows {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|r| record_id(r) != Some(id));
                before != rows.len()
            }
            None => false,
        };
        drop(guard);
        if !removed {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        self.count_write();
        Ok(())
    }
}
