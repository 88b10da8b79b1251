//! Schema migrations for the SQLite record store.
//!
//! Migrations are numbered SQL files embedded with `include_str!` and tracked
//! in `schema_version`. Each one runs inside its own transaction together with
//! its version row, so a crash mid-upgrade leaves the previous version intact.
//!
//! SQLite has no `ADD COLUMN IF NOT EXISTS`, so column additions are declared
//! on the migration and applied through `ensure_column` instead of living in
//! the SQL file. The SQL part must be safe to re-run.
//!
//! Databases created by early builds have a `records` table but no
//! `schema_version`; the bootstrap step marks the baseline as applied so its
//! SQL never runs against an already-populated database.

use rusqlite::Connection;

use crate::store::StoreError;

/// `(table, column, declaration)`
type ColumnSpec = (&'static str, &'static str, &'static str);

struct Migration {
    version: i32,
    columns: &'static [ColumnSpec],
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        columns: &[],
        sql: include_str!("migrations/001_baseline.sql"),
    },
    Migration {
        version: 2,
        columns: &[("records", "seq", "INTEGER NOT NULL DEFAULT 0")],
        sql: include_str!("migrations/002_insertion_order.sql"),
    },
];

fn ensure_schema_version_table(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i32, StoreError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?;
    Ok(stmt.exists([table, column])?)
}

/// Add `column` unless an interrupted earlier run already did.
fn ensure_column(conn: &Connection, (table, column, decl): ColumnSpec) -> Result<(), StoreError> {
    if has_column(conn, table, column)? {
        log::warn!("Column {table}.{column} already present, skipping ADD COLUMN");
        return Ok(());
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))?;
    Ok(())
}

/// Mark the baseline as applied for a pre-framework database with data.
fn bootstrap_existing_db(conn: &Connection) -> Result<(), StoreError> {
    if schema_version(conn)? > 0 {
        return Ok(());
    }

    let has_records = conn
        .prepare("SELECT 1 FROM records LIMIT 1")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if has_records {
        conn.execute("INSERT OR IGNORE INTO schema_version (version) VALUES (1)", [])?;
        log::info!("Existing records table found, baseline marked as applied");
    }
    Ok(())
}

/// Hot copy to `<db_path>.pre-migration.bak` via the online backup API.
/// In-memory databases are skipped.
fn backup_before_migration(conn: &Connection) -> Result<(), StoreError> {
    let db_path: String = conn.query_row("PRAGMA database_list", [], |row| row.get(2))?;
    if db_path.is_empty() || db_path == ":memory:" {
        return Ok(());
    }

    let backup_path = format!("{}.pre-migration.bak", db_path);
    let mut backup_conn = Connection::open(&backup_path)?;
    rusqlite::backup::Backup::new(conn, &mut backup_conn)?.step(-1)?;

    log::info!("Pre-migration backup created at {}", backup_path);
    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), StoreError> {
    let failed = |e: StoreError| StoreError::Migration(format!("v{}: {}", migration.version, e));

    let tx = conn.unchecked_transaction().map_err(|e| failed(e.into()))?;
    for column in migration.columns {
        ensure_column(&tx, *column).map_err(failed)?;
    }
    tx.execute_batch(migration.sql).map_err(|e| failed(e.into()))?;
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [migration.version],
    )
    .map_err(|e| failed(e.into()))?;
    tx.commit().map_err(|e| failed(e.into()))?;

    log::info!("Applied migration v{}", migration.version);
    Ok(())
}

fn run(conn: &Connection, migrations: &[Migration]) -> Result<usize, StoreError> {
    ensure_schema_version_table(conn)?;
    bootstrap_existing_db(conn)?;

    let current = schema_version(conn)?;
    let max_known = migrations.last().map(|m| m.version).unwrap_or(0);
    if current > max_known {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than this version of Scoutboard (v{max_known}); \
             update Scoutboard to open it"
        )));
    }

    let pending: Vec<&Migration> = migrations.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(0);
    }
    if current > 0 {
        backup_before_migration(conn)?;
    }

    for migration in &pending {
        apply(conn, migration)?;
    }
    Ok(pending.len())
}

/// Bring the schema up to date. Returns how many migrations ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, StoreError> {
    run(conn, MIGRATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        Connection::open_in_memory().expect("in-memory db")
    }

    /// A database left at v1 by an older build.
    fn v1_db(conn: &Connection) {
        ensure_schema_version_table(conn).unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .unwrap();
    }

    fn has_index(conn: &Connection, name: &str) -> bool {
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1")
            .and_then(|mut stmt| stmt.exists([name]))
            .unwrap()
    }

    #[test]
    fn test_fresh_db_applies_all() {
        let conn = mem_db();
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());
        assert_eq!(schema_version(&conn).unwrap(), 2);

        conn.execute(
            "INSERT INTO records (collection, id, body, seq) VALUES ('tasks', 't1', '{}', 1)",
            [],
        )
        .expect("records table should have seq column");
    }

    #[test]
    fn test_bootstrap_existing_db() {
        let conn = mem_db();
        conn.execute_batch(
            "CREATE TABLE records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (collection, id)
            );
            INSERT INTO records (collection, id, body) VALUES ('tasks', 'old', '{\"title\":\"Old\"}');",
        )
        .expect("seed existing db");

        // Baseline is skipped, v2 still runs.
        assert_eq!(run_migrations(&conn).expect("migrations should succeed"), 1);

        let (body, seq): (String, i64) = conn
            .query_row("SELECT body, seq FROM records WHERE id = 'old'", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("existing data should be preserved");
        assert!(body.contains("Old"));
        assert!(seq > 0);
    }

    #[test]
    fn test_forward_compat_guard() {
        let conn = mem_db();
        ensure_schema_version_table(&conn).unwrap();
        conn.execute("INSERT INTO schema_version (version) VALUES (999)", [])
            .unwrap();

        let err = run_migrations(&conn).unwrap_err().to_string();
        assert!(err.contains("newer than this version"), "{}", err);
    }

    #[test]
    fn test_idempotency() {
        let conn = mem_db();
        assert_eq!(run_migrations(&conn).expect("first run"), 2);
        assert_eq!(run_migrations(&conn).expect("second run"), 0);
    }

    #[test]
    fn test_half_applied_v2_recovers() {
        let conn = mem_db();
        v1_db(&conn);
        // Column added, but the version row and index never written.
        conn.execute_batch("ALTER TABLE records ADD COLUMN seq INTEGER NOT NULL DEFAULT 0;")
            .unwrap();

        assert_eq!(run_migrations(&conn).expect("resume upgrade"), 1);
        assert_eq!(schema_version(&conn).unwrap(), 2);
        assert!(has_index(&conn, "idx_records_collection_seq"));
    }

    #[test]
    fn test_failed_migration_rolls_back() {
        let conn = mem_db();
        v1_db(&conn);
        let broken = [
            Migration {
                version: 1,
                columns: &[],
                sql: MIGRATIONS[0].sql,
            },
            Migration {
                version: 2,
                columns: &[("records", "seq", "INTEGER NOT NULL DEFAULT 0")],
                sql: "CREATE TABLE scratch (a INTEGER); INSERT INTO missing_table VALUES (1);",
            },
        ];

        let err = run(&conn, &broken).unwrap_err();
        assert!(matches!(err, StoreError::Migration(_)));
        assert_eq!(schema_version(&conn).unwrap(), 1);
        assert!(!has_column(&conn, "records", "seq").unwrap());
        assert!(!has_column(&conn, "scratch", "a").unwrap());

        // The real v2 still applies afterwards.
        assert_eq!(run_migrations(&conn).expect("retry"), 1);
    }

    #[test]
    fn test_backup_created_for_upgrade() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("upgrade.db");
        let conn = Connection::open(&db_path).expect("open db");
        v1_db(&conn);

        assert_eq!(run_migrations(&conn).expect("upgrade"), 1);
        let backup = dir.path().join("upgrade.db.pre-migration.bak");
        assert!(backup.exists(), "backup should exist at {}", backup.display());
    }
}
