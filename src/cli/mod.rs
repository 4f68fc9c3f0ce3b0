//! CLI command implementations.
//!
//! Each submodule holds the `clap` arguments of one command and the function
//! running it. The binary only parses, loads configuration and dispatches.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `import` | Reconcile a CSV against the store, creating and updating records |
//! | `export` | Write records of one type to CSV |
//! | `inspect` | Show how a CSV header resolves, without touching the store |
//! | `config` | Show the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Preview what an edited export would change
//! quarry import posts.csv --dry-run
//!
//! # Import, renaming a spreadsheet column on the way in
//! quarry import posts.csv --map "Headline=post_title" --stop-on-error
//!
//! # Export published pages
//! quarry export pages.csv --type page --status publish
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod export;
mod import;
mod inspect;

pub use config::{ConfigArgs, run_config};
pub use export::{ExportArgs, run_export};
pub use import::{ImportArgs, parse_mapping, run_import};
pub use inspect::{InspectArgs, run_inspect};

use crate::config::QuarryConfig;
use crate::storage::sqlite::MediaFetcher;
use crate::storage::{
    CachedRecordStore, DEFAULT_CACHE_CAPACITY, RecordStore, SqliteRecordStore, default_store_path,
};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Opens the configured `SQLite` store behind an LRU read cache.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or initialized.
pub fn open_store(config: &QuarryConfig) -> Result<Arc<dyn RecordStore>> {
    let path = config.store_path.clone().unwrap_or_else(default_store_path);
    let mut fetcher = MediaFetcher::new(Duration::from_secs(config.media_timeout_secs))
        .with_max_bytes(config.media_max_bytes);
    if let Some(dir) = &config.media_dir {
        fetcher = fetcher.with_media_dir(dir);
    }
    let store = SqliteRecordStore::new(&path)?.with_fetcher(fetcher);
    for record_type in &config.record_types {
        store.register_type(record_type)?;
    }
    for (taxonomy, record_types) in &config.taxonomies {
        let types: Vec<&str> = record_types.iter().map(String::as_str).collect();
        store.register_taxonomy(taxonomy, &types)?;
    }
    for (name, kind) in &config.fields {
        store.register_field(name, *kind)?;
    }
    tracing::debug!(path = %path.display(), "Opened record store");
    Ok(Arc::new(CachedRecordStore::new(store, DEFAULT_CACHE_CAPACITY)))
}
