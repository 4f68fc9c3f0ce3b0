//! Read-through LRU cache over a record store.
//!
//! Import runs read every record they touch several times (identity
//! resolution, then one lookup per taxonomy, custom field and meta column
//! during change detection). Wrapping the store keeps those reads to one
//! `resolve` per record. The cache is bounded by capacity and emptied by
//! [`RecordStore::release_resources`], which the importer calls between
//! chunks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry::storage::{CachedRecordStore, SqliteRecordStore};
//!
//! let store = CachedRecordStore::new(SqliteRecordStore::new("quarry.db")?, 512);
//! ```

use super::traits::RecordStore;
use crate::Result;
use crate::models::{ContentRecord, CoreFields, FieldKind, FieldValue, MediaRef, RecordId};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Default number of cached records.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Record store wrapper caching `resolve` results.
pub struct CachedRecordStore<S: RecordStore> {
    inner: S,
    cache: Mutex<LruCache<RecordId, ContentRecord>>,
}

impl<S: RecordStore> CachedRecordStore<S> {
    /// Wraps `inner` with a cache of `capacity` records (minimum 1).
    #[must_use]
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the number of cached records.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock().map_or(0, |c| c.len())
    }

    fn lock(&self) -> Option<MutexGuard<'_, LruCache<RecordId, ContentRecord>>> {
        self.cache.lock().ok()
    }

    fn invalidate(&self, id: RecordId) {
        if let Some(mut cache) = self.lock() {
            cache.pop(&id);
        }
    }

    fn cached(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        if let Some(record) = self.lock().and_then(|mut c| c.get(&id).cloned()) {
            metrics::counter!("record_cache_hits_total").increment(1);
            return Ok(Some(record));
        }
        metrics::counter!("record_cache_misses_total").increment(1);

        let record = self.inner.resolve(id)?;
        if let Some(record) = &record
            && let Some(mut cache) = self.lock()
        {
            cache.put(id, record.clone());
        }
        Ok(record)
    }
}

impl<S: RecordStore> RecordStore for CachedRecordStore<S> {
    fn resolve(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        self.cached(id)
    }

    fn create(&self, core: &CoreFields) -> Result<RecordId> {
        self.inner.create(core)
    }

    fn update(&self, id: RecordId, core: &CoreFields) -> Result<()> {
        self.invalidate(id);
        self.inner.update(id, core)
    }

    fn type_exists(&self, record_type: &str) -> Result<bool> {
        self.inner.type_exists(record_type)
    }

    fn taxonomy_exists(&self, taxonomy: &str) -> Result<bool> {
        self.inner.taxonomy_exists(taxonomy)
    }

    fn taxonomy_terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        match self.cached(id)? {
            Some(record) => Ok(record.taxonomies.get(taxonomy).cloned().unwrap_or_default()),
            None => self.inner.taxonomy_terms(id, taxonomy),
        }
    }

    fn set_taxonomy_terms(
        &self,
        id: RecordId,
        taxonomy: &str,
        names: &[String],
        create_missing: bool,
    ) -> Result<Vec<String>> {
        self.invalidate(id);
        self.inner
            .set_taxonomy_terms(id, taxonomy, names, create_missing)
    }

    fn custom_field(&self, id: RecordId, name: &str) -> Result<Option<FieldValue>> {
        match self.cached(id)? {
            Some(record) => Ok(record.custom_fields.get(name).cloned()),
            None => self.inner.custom_field(id, name),
        }
    }

    fn set_custom_field(&self, id: RecordId, name: &str, value: &FieldValue) -> Result<()> {
        self.invalidate(id);
        self.inner.set_custom_field(id, name, value)
    }

    fn custom_field_kind(&self, name: &str) -> Option<FieldKind> {
        self.inner.custom_field_kind(name)
    }

    fn meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        match self.cached(id)? {
            Some(record) => Ok(record.meta.get(key).cloned()),
            None => self.inner.meta(id, key),
        }
    }

    fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        self.invalidate(id);
        self.inner.set_meta(id, key, value)
    }

    fn featured_media(&self, id: RecordId) -> Result<Option<MediaRef>> {
        match self.cached(id)? {
            Some(record) => Ok(record.featured_media),
            None => self.inner.featured_media(id),
        }
    }

    fn set_featured_media(&self, id: RecordId, media: &MediaRef) -> Result<()> {
        self.invalidate(id);
        self.inner.set_featured_media(id, media)
    }

    fn media_by_id(&self, media_id: u64) -> Result<Option<MediaRef>> {
        self.inner.media_by_id(media_id)
    }

    fn media_by_url(&self, url: &str) -> Result<Option<MediaRef>> {
        self.inner.media_by_url(url)
    }

    fn sideload_media(&self, url: &str) -> Result<MediaRef> {
        self.inner.sideload_media(url)
    }

    fn find_author(&self, login_or_email: &str) -> Result<Option<u64>> {
        self.inner.find_author(login_or_email)
    }

    fn list_records(&self, record_type: &str, statuses: &[String]) -> Result<Vec<ContentRecord>> {
        self.inner.list_records(record_type, statuses)
    }

    fn taxonomies_for_type(&self, record_type: &str) -> Result<Vec<String>> {
        self.inner.taxonomies_for_type(record_type)
    }

    fn custom_field_names(&self, record_type: &str) -> Result<Vec<String>> {
        self.inner.custom_field_names(record_type)
    }

    fn release_resources(&self) {
        if let Some(mut cache) = self.lock() {
            tracing::debug!(entries = cache.len(), "Releasing record cache");
            cache.clear();
        }
        self.inner.release_resources();
    }
}
