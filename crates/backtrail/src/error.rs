//! Error types for backtrail.
//!
//! This module defines all error types used throughout the backtrail crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for backtrail operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A timestamp has no fixed-width stored form.
    #[error("timestamp {timestamp} is outside the storable years 0000-9999")]
    TimestampOutOfRange {
        /// The rejected timestamp.
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The store can no longer be trusted: initialization or a save failed.
    ///
    /// The host process is expected to terminate when it sees this.
    #[error("unrecoverable storage failure during {operation}: {source}")]
    Unrecoverable {
        /// The operation that failed.
        operation: &'static str,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Location Errors ===
    /// A location provider failed to start.
    #[error("failed to start location provider '{name}': {message}")]
    ProviderStart {
        /// Name of the location provider.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for backtrail operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a provider start error.
    #[must_use]
    pub fn provider_start(name: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderStart {
            name,
            message: message.into(),
        }
    }

    /// Escalate an error into the unrecoverable kind.
    ///
    /// Already-unrecoverable errors are returned unchanged.
    #[must_use]
    pub fn unrecoverable(operation: &'static str, source: Error) -> Self {
        if source.is_unrecoverable() {
            return source;
        }
        Self::Unrecoverable {
            operation,
            source: Box::new(source),
        }
    }

    /// Check if this error means the store must not be used any further.
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Unrecoverable { .. })
    }
}
