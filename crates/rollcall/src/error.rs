//! Error types for rollcall.
//!
//! Store failures are split the way callers need to react to them: writes,
//! reads, and the half-finished phone replacement that leaves a record with
//! fewer phones than the form intended.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rollcall operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Database Errors ===
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

    // === Store Errors ===
    /// A create, replace or delete against the record store failed.
    #[error("store write failed during {operation}: {message}")]
    StoreWrite {
        /// The store operation that failed.
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Listing the record store failed.
    #[error("store read failed during {operation}: {message}")]
    StoreRead {
        /// The store operation that failed.
        operation: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// Old phones were deleted but the new ones were not all written.
    #[error(
        "phone sync for {store_id} incomplete: deleted {deleted}, added {added} of {expected}: {message}"
    )]
    PartialPhoneSync {
        /// Store id of the record whose phones are incomplete.
        store_id: String,
        /// Phone documents removed by the delete phase.
        deleted: usize,
        /// Phone documents written by the add phase.
        added: usize,
        /// Phone documents the add phase was asked to write.
        expected: usize,
        /// First failure reported by the add phase.
        message: String,
    },

    /// A request referenced something that does not exist locally.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // === I/O Errors ===
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

/// A specialized Result type for rollcall operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new store write error.
    #[must_use]
    pub fn store_write(operation: &'static str, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            operation,
            message: message.into(),
        }
    }

    /// Create a new store read error.
    #[must_use]
    pub fn store_read(operation: &'static str, message: impl Into<String>) -> Self {
        Self::StoreRead {
            operation,
            message: message.into(),
        }
    }

    /// Create a new invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Reclassify as a write failure of `operation`.
    ///
    /// Errors that already describe a store write are returned unchanged.
    #[must_use]
    pub fn into_write(self, operation: &'static str) -> Self {
        if self.is_store_write() {
            self
        } else {
            Self::store_write(operation, self.to_string())
        }
    }

    /// Reclassify as a read failure of `operation`.
    #[must_use]
    pub fn into_read(self, operation: &'static str) -> Self {
        if self.is_store_read() {
            self
        } else {
            Self::store_read(operation, self.to_string())
        }
    }

    /// Check if this error is a failed store write.
    ///
    /// A partial phone sync counts: it is a write that did not finish.
    #[must_use]
    pub fn is_store_write(&self) -> bool {
        matches!(self, Self::StoreWrite { .. } | Self::PartialPhoneSync { .. })
    }

    /// Check if this error is a failed store read.
    #[must_use]
    pub fn is_store_read(&self) -> bool {
        matches!(self, Self::StoreRead { .. })
    }

    /// Check if this error left a record with an incomplete phone list.
    #[must_use]
    pub fn is_partial_phone_sync(&self) -> bool {
        matches!(self, Self::PartialPhoneSync { .. })
    }
}
