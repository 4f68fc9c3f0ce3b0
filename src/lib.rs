//! # Quarry
//!
//! Spreadsheet round-tripping for site content.
//!
//! Quarry exports content records (posts, custom types, structured custom
//! fields, taxonomy terms, featured media) to CSV and re-imports edited CSVs,
//! reconciling every row against the live record before writing anything.
//!
//! ## Features
//!
//! - Stable flat-cell encoding for taxonomy terms, lists, structured values and media
//! - Field-by-field change detection with a dry-run preview
//! - Per-row failure isolation with an append-only run log
//! - Idempotent re-import: an unmodified export imports as a no-op
//! - Pluggable record stores (in-memory, `SQLite`, LRU read cache)
//!
//! ## Example
//!
//! ```rust,ignore
//! use quarry::io::{ImportOptions, ImportService, RunContext};
//! use quarry::storage::InMemoryRecordStore;
//! use std::sync::Arc;
//!
//! let service = ImportService::new(Arc::new(InMemoryRecordStore::new()));
//! let mut run = RunContext::in_memory();
//! let result = service.import_file("posts.csv".as_ref(), &ImportOptions::default(), &mut run, None)?;
//! println!("{} created, {} updated", result.created, result.updated);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::{ImportSettings, QuarryConfig};
pub use io::{ImportOptions, ImportResult, ImportService, RunContext};
pub use models::{ChangeSet, ContentRecord, CoreFields, FieldKind, FieldValue, RecordId};
pub use storage::RecordStore;

/// Error type for quarry operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed CSV headers, bad CLI arguments, unparseable config values |
/// | `OperationFailed` | I/O errors, `SQLite` failures, HTTP fetch failures |
/// | `NotFound` | A record, term or media item addressed by identity does not exist |
/// | `Rejected` | The record store refuses a write (validation failure) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The CSV header row is missing or unreadable
    /// - A field mapping or CLI argument is malformed
    /// - A configuration value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O fails (CSV, run log, config)
    /// - `SQLite` statements fail
    /// - A media download fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A record, term or media item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record store rejected a write.
    ///
    /// The message is meant for end users and is reported verbatim in
    /// import results.
    #[error("{0}")]
    Rejected(String),
}

/// Result type alias for quarry operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::Rejected("Content, title, and excerpt are empty.".to_string());
        assert_eq!(err.to_string(), "Content, title, and excerpt are empty.");
    }
}
