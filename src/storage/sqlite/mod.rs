//! `SQLite` record store.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition with poison recovery, pragmas, transactions
//! - [`record_row`]: row conversion for [`ContentRecord`](crate::models::ContentRecord)
//! - [`media`]: HTTP media download with content-hash naming
//! - [`metrics`]: store operation metrics
//! - [`store`]: the [`SqliteRecordStore`] itself

mod connection;
pub mod media;
mod metrics;
mod record_row;
mod store;

pub use connection::{acquire_lock, configure_connection, with_transaction};
pub use media::{FetchedMedia, MediaFetcher};
pub use metrics::{observe, record_operation_metrics};
pub use record_row::{RecordRow, load_record};
pub use store::SqliteRecordStore;
