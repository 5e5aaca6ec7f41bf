//! `SQLite` schema definitions for backtrail.

/// SQL statement to create the locations table.
///
/// Timestamps are fixed-width RFC 3339 strings with nanosecond precision, so
/// lexicographic order matches chronological order.
pub const CREATE_LOCATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    location_timestamp TEXT NOT NULL,
    inserted_timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index on `location_timestamp` for display order.
pub const CREATE_LOCATION_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_locations_location_timestamp
ON locations(location_timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Statements creating the version 1 schema, in order.
pub const SCHEMA_V1: &[&str] = &[CREATE_LOCATIONS_TABLE, CREATE_LOCATION_TIMESTAMP_INDEX];
