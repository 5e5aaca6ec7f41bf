//! Storage layer for backtrail.
//!
//! This module provides `SQLite`-based persistent storage for recorded
//! locations. Records are staged with [`LocationStore::add_location`] and only
//! written by an explicit [`LocationStore::save_context`].

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::record::{is_storable_timestamp, LocationRecord};

const SELECT_COLUMNS: &str =
    "SELECT id, latitude, longitude, location_timestamp, inserted_timestamp FROM locations";

/// Handle to the location database.
///
/// The handle is constructed explicitly and passed by reference to whatever
/// needs it. Initialization and save failures are reported as
/// [`Error::Unrecoverable`]; read failures are ordinary errors.
#[derive(Debug)]
pub struct LocationStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
    /// Whether the database lives only in memory.
    in_memory: bool,
    /// Records staged by `add_location` and not yet saved.
    pending: Vec<LocationRecord>,
}

impl LocationStore {
    /// Open or create a location database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unrecoverable`] if the directory, database or schema
    /// cannot be set up.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_inner(path.as_ref()).map_err(|e| Error::unrecoverable("open", e))
    }

    fn open_inner(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            path,
            conn,
            in_memory: false,
            pending: Vec::new(),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unrecoverable`] if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let open = || -> Result<Self> {
            let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
                path: PathBuf::from(":memory:"),
                source,
            })?;
            migrations::initialize_schema(&conn)?;
            Ok(Self {
                path: PathBuf::from(":memory:"),
                conn,
                in_memory: true,
                pending: Vec::new(),
            })
        };
        open().map_err(|e| Error::unrecoverable("open", e))
    }

    /// Save any staged records and close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unrecoverable`] if the final save or the close fails.
    pub fn close(mut self) -> Result<()> {
        self.save_context()?;
        let path = self.path.clone();
        self.conn.close().map_err(|(_, source)| {
            Error::unrecoverable("close", Error::DatabaseOpen { path, source })
        })?;
        debug!("Database closed");
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage a new record. Nothing is written until [`Self::save_context`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimestampOutOfRange`] if `timestamp` falls outside
    /// [`STORABLE_YEARS`](crate::record::STORABLE_YEARS). Nothing is staged.
    pub fn add_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<LocationRecord> {
        if !is_storable_timestamp(timestamp) {
            return Err(Error::TimestampOutOfRange { timestamp });
        }
        let record = LocationRecord::new(latitude, longitude, timestamp);
        self.pending.push(record.clone());
        Ok(record)
    }

    /// Whether any records are staged.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Write all staged records in a single transaction.
    ///
    /// Returns the number of records written; 0 when nothing was staged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unrecoverable`] if the write fails. Staged records are
    /// kept so the caller can inspect them, but the store should not be used
    /// further.
    pub fn save_context(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let written = self
            .write_pending()
            .map_err(|e| Error::unrecoverable("save", e))?;
        self.pending.clear();
        debug!("Saved {} staged locations", written);
        Ok(written)
    }

    fn write_pending(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r"
                INSERT INTO locations (latitude, longitude, location_timestamp, inserted_timestamp)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )?;
            for record in &self.pending {
                stmt.execute(params![
                    record.latitude,
                    record.longitude,
                    encode_timestamp(record.location_timestamp)?,
                    encode_timestamp(record.inserted_timestamp)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(self.pending.len())
    }

    /// All saved records, newest `location_timestamp` first.
    ///
    /// Records sharing a timestamp come back in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn locations(&self) -> Result<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY location_timestamp DESC, id ASC"
        ))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// The `limit` newest saved records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn recent(&self, limit: usize) -> Result<Vec<LocationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_COLUMNS} ORDER BY location_timestamp DESC, id ASC LIMIT ?1"
        ))?;
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map([limit_i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Count saved records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database read fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_locations = self.count()?;

        let oldest = self.boundary_timestamp("ASC")?;
        let newest = self.boundary_timestamp("DESC")?;

        let db_size_bytes = if self.in_memory {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_locations,
            oldest_location: oldest,
            newest_location: newest,
            db_size_bytes,
        })
    }

    fn boundary_timestamp(&self, direction: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT location_timestamp FROM locations \
                     ORDER BY location_timestamp {direction} LIMIT 1"
                ),
                [],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|s| match decode_timestamp(&s) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!("Ignoring unparseable timestamp {:?}: {}", s, e);
                None
            }
        }))
    }

    /// Convert a database row to a `LocationRecord`.
    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<LocationRecord> {
        let id: i64 = row.get(0)?;
        let latitude: f64 = row.get(1)?;
        let longitude: f64 = row.get(2)?;
        let location_timestamp: String = row.get(3)?;
        let inserted_timestamp: String = row.get(4)?;

        let parse = |idx: usize, raw: &str| {
            decode_timestamp(raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        };

        Ok(LocationRecord {
            id: Some(id),
            latitude,
            longitude,
            location_timestamp: parse(3, &location_timestamp)?,
            inserted_timestamp: parse(4, &inserted_timestamp)?,
        })
    }
}

fn encode_timestamp(ts: DateTime<Utc>) -> Result<String> {
    if !is_storable_timestamp(ts) {
        return Err(Error::TimestampOutOfRange { timestamp: ts });
    }
    Ok(ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn decode_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of saved locations.
    pub total_locations: i64,
    /// Oldest `location_timestamp`.
    pub oldest_location: Option<DateTime<Utc>>,
    /// Newest `location_timestamp`.
    pub newest_location: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
