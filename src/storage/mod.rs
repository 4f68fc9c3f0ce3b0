//! Record store layer.
//!
//! The import engine talks to content through the [`RecordStore`] trait.
//! Three stores ship with the crate:
//!
//! - [`InMemoryRecordStore`]: non-persistent, counts mutations (tests)
//! - [`SqliteRecordStore`]: durable embedded store with HTTP media sideload
//! - [`CachedRecordStore`]: LRU read cache wrapping any other store

// Allow significant_drop_tightening - holding the connection guard for the
// whole closure keeps each store call atomic.
#![allow(clippy::significant_drop_tightening)]

pub mod cached;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use cached::{CachedRecordStore, DEFAULT_CACHE_CAPACITY};
pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;
pub use traits::{EMPTY_RECORD_MESSAGE, RecordStore};

use std::path::PathBuf;

/// Returns the default database location under the user's data directory.
///
/// Falls back to `./quarry.db` when no home directory can be determined.
#[must_use]
pub fn default_store_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("quarry.db"),
        |d| d.data_dir().join("quarry").join("quarry.db"),
    )
}
