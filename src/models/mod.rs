//! Data models for quarry.
//!
//! Content records, typed custom field values and field-level change sets.

mod change;
mod field;
mod record;

pub use change::{ChangeSet, EMPTY_PLACEHOLDER, FieldChange, display_or_placeholder};
pub use field::{FieldKind, FieldValue};
pub use record::{
    ContentRecord, CoreField, CoreFields, DATETIME_FORMAT, MediaRef, RecordId, sanitize_slug,
};
