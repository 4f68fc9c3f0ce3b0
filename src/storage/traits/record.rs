//! Record store trait.
//!
//! The record store is the authoritative home of content records, their
//! taxonomy associations, custom fields, meta values and media. The import
//! engine only reads through it and writes through it; it never caches
//! record state across rows on its own.
//!
//! # Available Implementations
//!
//! | Store | Use Case | Notes |
//! |-------|----------|-------|
//! | `InMemoryRecordStore` | Tests, dry experiments | Counts mutations, offline media |
//! | `SqliteRecordStore` | Default; embedded | Transactional writes, HTTP media sideload |
//! | `CachedRecordStore` | Large imports | LRU over `resolve`, cleared between chunks |
//!
//! # Error Modes
//!
//! | Error | Meaning for the importer |
//! |-------|--------------------------|
//! | `Error::Rejected` | The write failed validation; message is shown verbatim |
//! | `Error::NotFound` | The addressed record or media does not exist |
//! | `Error::OperationFailed` | Backend fault; reported as an unexpected failure |

use crate::Result;
use crate::models::{ContentRecord, CoreFields, FieldKind, FieldValue, MediaRef, RecordId};

/// Rejection message for a record with no title, content or excerpt.
pub const EMPTY_RECORD_MESSAGE: &str = "Content, title, and excerpt are empty.";

/// Read/write access to content records.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn RecordStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `update` overlays only the fields set in the given [`CoreFields`]
/// - `set_taxonomy_terms` with an empty slice clears the taxonomy
pub trait RecordStore: Send + Sync {
    /// Loads a record with all of its associations.
    fn resolve(&self, id: RecordId) -> Result<Option<ContentRecord>>;

    /// Creates a record from core fields and returns its identity.
    ///
    /// Returns [`crate::Error::Rejected`] when title, content and excerpt are all empty.
    fn create(&self, core: &CoreFields) -> Result<RecordId>;

    /// Overlays the set core fields onto an existing record.
    fn update(&self, id: RecordId, core: &CoreFields) -> Result<()>;

    /// Returns true when the record type is registered.
    fn type_exists(&self, record_type: &str) -> Result<bool>;

    /// Returns true when the taxonomy is registered.
    fn taxonomy_exists(&self, taxonomy: &str) -> Result<bool>;

    /// Returns the term names assigned to a record, in assignment order.
    fn taxonomy_terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>>;

    /// Replaces the terms of one taxonomy on a record.
    ///
    /// Names resolve to existing terms by name, then by slug. Missing terms
    /// are created when `create_missing` is set and dropped otherwise. When
    /// `names` is non-empty but none of them resolve, the current assignment
    /// is left untouched. Returns the names actually assigned.
    fn set_taxonomy_terms(
        &self,
        id: RecordId,
        taxonomy: &str,
        names: &[String],
        create_missing: bool,
    ) -> Result<Vec<String>>;

    /// Returns the stored value of a custom field.
    fn custom_field(&self, id: RecordId, name: &str) -> Result<Option<FieldValue>>;

    /// Stores a custom field value.
    fn set_custom_field(&self, id: RecordId, name: &str, value: &FieldValue) -> Result<()>;

    /// Returns the declared kind of a custom field, if the store knows it.
    fn custom_field_kind(&self, name: &str) -> Option<FieldKind>;

    /// Returns a meta value.
    fn meta(&self, id: RecordId, key: &str) -> Result<Option<String>>;

    /// Stores a meta value.
    fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()>;

    /// Returns the featured media of a record.
    fn featured_media(&self, id: RecordId) -> Result<Option<MediaRef>>;

    /// Sets the featured media of a record.
    fn set_featured_media(&self, id: RecordId, media: &MediaRef) -> Result<()>;

    /// Looks up a media item by identity.
    fn media_by_id(&self, media_id: u64) -> Result<Option<MediaRef>>;

    /// Looks up a previously imported media item by its URL.
    fn media_by_url(&self, url: &str) -> Result<Option<MediaRef>>;

    /// Fetches a remote file and registers it as a media item.
    fn sideload_media(&self, url: &str) -> Result<MediaRef>;

    /// Resolves an author by login or e-mail address.
    fn find_author(&self, login_or_email: &str) -> Result<Option<u64>>;

    /// Lists records of a type, optionally filtered by status.
    ///
    /// An empty `statuses` slice matches every status.
    fn list_records(&self, record_type: &str, statuses: &[String]) -> Result<Vec<ContentRecord>>;

    /// Returns the taxonomies registered for a record type.
    fn taxonomies_for_type(&self, record_type: &str) -> Result<Vec<String>>;

    /// Returns the custom field names used by records of a type.
    fn custom_field_names(&self, record_type: &str) -> Result<Vec<String>>;

    /// Drops any per-identity read caches.
    ///
    /// Called by the importer between chunks of a large run.
    fn release_resources(&self) {}

    /// Returns true when the record exists.
    fn exists(&self, id: RecordId) -> Result<bool> {
        Ok(self.resolve(id)?.is_some())
    }
}
