//! Storage backend traits.

mod record;

pub use record::{EMPTY_RECORD_MESSAGE, RecordStore};
