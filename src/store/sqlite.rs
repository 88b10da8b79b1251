//! SQLite-backed record store.
//!
//! The database lives at `~/.scoutboard/scoutboard.db` unless the config
//! overrides it. Every collection shares the `records` table; bodies are JSON
//! objects and `seq` keeps fetches in insertion order.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::{assign_id, Record, RecordFilter, RecordStore, StoreError};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at the default location and apply the schema.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(Self::db_path()?)
    }

    pub fn db_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(home.join(".scoutboard").join("scoutboard.db"))
    }

    /// Open a database at an explicit path. Useful for testing.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(path)?;
        // WAL keeps reads from blocking behind a board's write.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        crate::migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteStore {
    fn fetch_all(
        &self,
        collection: &str,
        filter: Option<&RecordFilter>,
    ) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, body FROM records
             WHERE collection = ?1
             ORDER BY seq, rowid",
        )?;
        let rows = stmt.query_map(params![collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, body) = row?;
            match serde_json::from_str::<Record>(&body) {
                Ok(record) => {
                    if filter.map_or(true, |f| f.matches(&record)) {
                        records.push(record);
                    }
                }
                Err(e) => log::warn!("Skipping malformed record {collection}/{id}: {e}"),
            }
        }
        Ok(records)
    }

    fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let id = assign_id(&mut record);
        let body = serde_json::to_string(&record)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO records (collection, id, body, created_at, updated_at, seq)
             VALUES (?1, ?2, ?3, ?4, ?4, (SELECT COALESCE(MAX(seq), 0) + 1 FROM records))",
            params![collection, id, body, now],
        )?;
        Ok(record)
    }

    fn update(&self, collection: &str, id: &str, patch: &Record) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let body: Option<String> = tx
            .query_row(
                "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let body = body.ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        let mut record: Record = serde_json::from_str(&body)?;
        for (key, value) in patch {
            if key != "id" {
                record.insert(key.clone(), value.clone());
            }
        }

        tx.execute(
            "UPDATE records SET body = ?3, updated_at = ?4
             WHERE collection = ?1 AND id = ?2",
            params![
                collection,
                id,
                serde_json::to_string(&record)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        if removed == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> SqliteStore {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        SqliteStore::open_at(path).expect("open")
    }

    fn rec(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_assigns_id_and_fetch_preserves_order() {
        let store = test_store();
        let a = store
            .insert("scouted_players", rec(json!({"name": "Bauer"})))
            .expect("insert");
        store
            .insert("scouted_players", rec(json!({"id": "p2", "name": "Adler"})))
            .expect("insert");
        store
            .insert("tasks", rec(json!({"title": "Other collection"})))
            .expect("insert");

        assert!(a["id"].as_str().is_some());
        let rows = store.fetch_all("scouted_players", None).expect("fetch");
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Bauer", "Adler"]);
    }

    #[test]
    fn test_fetch_applies_filter() {
        let store = test_store();
        store
            .insert("tasks", rec(json!({"title": "Mine", "owner_id": "u1"})))
            .unwrap();
        store
            .insert("tasks", rec(json!({"title": "Theirs", "owner_id": "u2"})))
            .unwrap();

        let filter = RecordFilter::new().eq("owner_id", "u1");
        let rows = store.fetch_all("tasks", Some(&filter)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Mine");
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let store = test_store();
        store
            .insert(
                "transfer_interests",
                rec(json!({"id": "t1", "club_name": "Rapid", "status": "idee"})),
            )
            .unwrap();
        store
            .update(
                "transfer_interests",
                "t1",
                &rec(json!({"status": "interessiert", "id": "hijack"})),
            )
            .unwrap();

        let rows = store.fetch_all("transfer_interests", None).unwrap();
        assert_eq!(rows[0]["status"], "interessiert");
        assert_eq!(rows[0]["club_name"], "Rapid");
        assert_eq!(rows[0]["id"], "t1");
    }

    #[test]
    fn test_update_and_delete_missing_are_not_found() {
        let store = test_store();
        assert!(matches!(
            store.update("tasks", "ghost", &Record::new()),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("tasks", "ghost"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_body_is_skipped() {
        let store = test_store();
        store.insert("tasks", rec(json!({"id": "ok"}))).unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO records (collection, id, body, seq) VALUES ('tasks', 'bad', 'not json', 99)",
                [],
            )
            .unwrap();

        let rows = store.fetch_all("tasks", None).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_in_memory_store_works() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.insert("tasks", rec(json!({"id": "x"}))).unwrap();
        store.delete("tasks", "x").unwrap();
        assert!(store.fetch_all("tasks", None).unwrap().is_empty());
    }
}
