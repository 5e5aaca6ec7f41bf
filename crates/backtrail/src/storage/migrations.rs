//! Database schema versioning for backtrail.
//!
//! The `metadata` table records which entry of [`MIGRATIONS`] was applied
//! last. Each step runs in its own transaction together with the version bump.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, SCHEMA_V1};

/// Schema steps, indexed by the version they produce.
const MIGRATIONS: &[(i32, &[&str])] = &[(1, SCHEMA_V1)];

/// The schema version this build reads and writes.
pub const CURRENT_VERSION: i32 = 1;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a migration step fails, or if the database was written
/// by a newer version of backtrail.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let stored = schema_version(conn)?;
    if stored > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {stored} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for &(version, statements) in MIGRATIONS.iter().filter(|(v, _)| *v > stored) {
        apply(conn, version, statements)?;
        info!("Migrated location database to schema version {}", version);
    }
    Ok(())
}

/// The stored schema version; 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    raw.map_or(Ok(0), |value| {
        value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        })
    })
}

fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for statement in statements {
        tx.execute(statement, []).map_err(|e| Error::DatabaseMigration {
            message: format!("schema version {version}: {e}"),
        })?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count == 1
    }

    fn store_version(conn: &Connection, value: &str) {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            [VERSION_KEY, value],
        )
        .unwrap();
    }

    #[test]
    fn test_migrations_end_at_current_version() {
        assert_eq!(MIGRATIONS.last().map(|(v, _)| *v), Some(CURRENT_VERSION));
        for (idx, (version, _)) in MIGRATIONS.iter().enumerate() {
            assert_eq!(usize::try_from(*version).unwrap(), idx + 1);
        }
    }

    #[test]
    fn test_fresh_database_gets_current_schema() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        assert!(table_exists(&conn, "locations"));
        assert!(table_exists(&conn, "metadata"));
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO locations (latitude, longitude, location_timestamp, inserted_timestamp) \
             VALUES (1.0, 2.0, 'a', 'b')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        store_version(&conn, &(CURRENT_VERSION + 1).to_string());

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_invalid_version_value() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        store_version(&conn, "abc");

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("invalid schema version"));
    }

    #[test]
    fn test_failed_step_leaves_version_unchanged() {
        let conn = create_test_db();
        conn.execute(CREATE_METADATA_TABLE, []).unwrap();

        let err = apply(&conn, 7, &["CREATE TABLE broken ("]).unwrap_err();
        assert!(err.to_string().contains("schema version 7"));
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_timestamp_index_created() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='locations'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        assert!(indexes.iter().any(|n| n.contains("location_timestamp")));
    }
}
