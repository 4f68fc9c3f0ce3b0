//! In-memory record store for testing.
//!
//! Provides a fast, non-persistent implementation of [`RecordStore`] for use
//! in unit tests, integration tests and dry experiments. Every write goes
//! through a mutation counter so tests can assert that a run touched nothing.

use crate::models::{
    ContentRecord, CoreFields, FieldKind, FieldValue, MediaRef, RecordId, sanitize_slug,
};
use crate::storage::traits::{EMPTY_RECORD_MESSAGE, RecordStore};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct Term {
    name: String,
    slug: String,
}

#[derive(Debug, Clone, Default)]
struct Taxonomy {
    record_types: BTreeSet<String>,
    terms: Vec<Term>,
}

impl Taxonomy {
    fn find(&self, name: &str) -> Option<&Term> {
        let slug = sanitize_slug(name);
        self.terms
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .or_else(|| self.terms.iter().find(|t| !slug.is_empty() && t.slug == slug))
    }
}

#[derive(Debug, Clone)]
struct Author {
    id: u64,
    login: String,
    email: String,
}

#[derive(Debug, Default)]
struct State {
    records: BTreeMap<RecordId, ContentRecord>,
    next_id: u64,
    types: BTreeSet<String>,
    taxonomies: BTreeMap<String, Taxonomy>,
    field_kinds: BTreeMap<String, FieldKind>,
    media: BTreeMap<u64, MediaRef>,
    authors: Vec<Author>,
    mutations: usize,
    offline: bool,
}

impl State {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record_mut(&mut self, id: RecordId) -> Result<&mut ContentRecord> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("record {id}")))
    }

    fn record(&self, id: RecordId) -> Result<&ContentRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("record {id}")))
    }
}

/// In-memory record store.
///
/// Uses `RwLock` for thread-safe access with reader-writer semantics.
/// Data is not persisted between runs.
///
/// # Example
///
/// ```rust,ignore
/// use quarry::storage::InMemoryRecordStore;
///
/// let store = InMemoryRecordStore::new();
/// store.register_type("post");
/// store.register_taxonomy("category", &["post"]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<State>,
}

impl InMemoryRecordStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the `post` and `page` types and the `category`
    /// and `post_tag` taxonomies registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let store = Self::new();
        store.register_type("post");
        store.register_type("page");
        store.register_taxonomy("category", &["post"]);
        store.register_taxonomy("post_tag", &["post"]);
        store
    }

    /// Makes `sideload_media` fail, as if the network were unreachable.
    #[must_use]
    pub fn offline(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.offline = true;
        }
        self
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        })
    }

    /// Registers a record type.
    pub fn register_type(&self, record_type: &str) {
        if let Ok(mut state) = self.state.write() {
            state.types.insert(record_type.to_string());
        }
    }

    /// Registers a taxonomy for the given record types.
    pub fn register_taxonomy(&self, taxonomy: &str, record_types: &[&str]) {
        if let Ok(mut state) = self.state.write() {
            let entry = state.taxonomies.entry(taxonomy.to_string()).or_default();
            entry
                .record_types
                .extend(record_types.iter().map(ToString::to_string));
        }
    }

    /// Adds a term to a registered taxonomy.
    pub fn register_term(&self, taxonomy: &str, name: &str, slug: &str) {
        if let Ok(mut state) = self.state.write()
            && let Some(tax) = state.taxonomies.get_mut(taxonomy)
            && tax.find(name).is_none()
        {
            tax.terms.push(Term {
                name: name.to_string(),
                slug: slug.to_string(),
            });
        }
    }

    /// Declares the kind of a custom field.
    pub fn register_field(&self, name: &str, kind: FieldKind) {
        if let Ok(mut state) = self.state.write() {
            state.field_kinds.insert(name.to_string(), kind);
        }
    }

    /// Registers an author.
    pub fn register_author(&self, id: u64, login: &str, email: &str) {
        if let Ok(mut state) = self.state.write() {
            state.authors.push(Author {
                id,
                login: login.to_string(),
                email: email.to_string(),
            });
        }
    }

    /// Adds a media item and returns its reference.
    pub fn add_media(&self, url: &str) -> Option<MediaRef> {
        let mut state = self.state.write().ok()?;
        let id = state.allocate_id();
        let media = MediaRef::new(id, Some(url.to_string()));
        state.media.insert(id, media.clone());
        Some(media)
    }

    /// Inserts a record as-is, without counting a mutation.
    ///
    /// Allocates an identity when the record has none and registers any
    /// terms it references.
    pub fn insert(&self, mut record: ContentRecord) -> Option<RecordId> {
        let mut state = self.state.write().ok()?;
        let id = match record.id {
            Some(id) => {
                state.next_id = state.next_id.max(id.get());
                id
            },
            None => RecordId::new(state.allocate_id()),
        };
        record.id = Some(id);
        for (taxonomy, names) in &record.taxonomies {
            let tax = state.taxonomies.entry(taxonomy.clone()).or_default();
            if let Some(record_type) = &record.core.record_type {
                tax.record_types.insert(record_type.clone());
            }
            for name in names {
                if tax.find(name).is_none() {
                    tax.terms.push(Term {
                        name: name.clone(),
                        slug: sanitize_slug(name),
                    });
                }
            }
        }
        if let Some(media) = &record.featured_media {
            state.media.entry(media.id).or_insert_with(|| media.clone());
        }
        state.records.insert(id, record);
        Some(id)
    }

    /// Returns the number of writes performed through the [`RecordStore`] interface.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state.read().map(|s| s.mutations).unwrap_or(0)
    }

    /// Returns the number of records stored.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Returns the names of all terms in a taxonomy.
    #[must_use]
    pub fn term_names(&self, taxonomy: &str) -> Vec<String> {
        self.state
            .read()
            .ok()
            .and_then(|s| {
                s.taxonomies
                    .get(taxonomy)
                    .map(|t| t.terms.iter().map(|term| term.name.clone()).collect())
            })
            .unwrap_or_default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn resolve(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        let state = self.read("resolve")?;
        Ok(state.records.get(&id).cloned())
    }

    fn create(&self, core: &CoreFields) -> Result<RecordId> {
        let mut state = self.write("create")?;
        if core.is_blank() {
            return Err(Error::Rejected(EMPTY_RECORD_MESSAGE.to_string()));
        }
        let record_type = core.record_type.clone().unwrap_or_default();
        if !state.types.contains(&record_type) {
            return Err(Error::Rejected("Invalid post type.".to_string()));
        }

        let id = RecordId::new(state.allocate_id());
        let now = chrono::Local::now().naive_local();
        let mut stored = core.clone();
        if stored.slug.as_deref().is_none_or(str::is_empty) {
            stored.slug = stored.title.as_deref().map(sanitize_slug);
        }
        if stored.status.is_none() {
            stored.status = Some("draft".to_string());
        }
        if stored.date.is_none() {
            stored.date = Some(now);
        }
        let record = ContentRecord {
            id: Some(id),
            core: stored,
            modified: Some(now),
            ..ContentRecord::default()
        };
        state.records.insert(id, record);
        state.mutations += 1;
        Ok(id)
    }

    fn update(&self, id: RecordId, core: &CoreFields) -> Result<()> {
        let mut state = self.write("update")?;
        let record = state.record_mut(id)?;
        let mut merged = record.core.clone();
        merged.merge(core);
        if merged.is_blank() {
            return Err(Error::Rejected(EMPTY_RECORD_MESSAGE.to_string()));
        }
        record.core = merged;
        record.modified = Some(chrono::Local::now().naive_local());
        state.mutations += 1;
        Ok(())
    }

    fn type_exists(&self, record_type: &str) -> Result<bool> {
        Ok(self.read("type_exists")?.types.contains(record_type))
    }

    fn taxonomy_exists(&self, taxonomy: &str) -> Result<bool> {
        Ok(self
            .read("taxonomy_exists")?
            .taxonomies
            .contains_key(taxonomy))
    }

    fn taxonomy_terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        let state = self.read("taxonomy_terms")?;
        Ok(state
            .record(id)?
            .taxonomies
            .get(taxonomy)
            .cloned()
            .unwrap_or_default())
    }

    fn set_taxonomy_terms(
        &self,
        id: RecordId,
        taxonomy: &str,
        names: &[String],
        create_missing: bool,
    ) -> Result<Vec<String>> {
        let mut state = self.write("set_taxonomy_terms")?;
        let current = state
            .record(id)?
            .taxonomies
            .get(taxonomy)
            .cloned()
            .unwrap_or_default();
        let tax = state
            .taxonomies
            .get_mut(taxonomy)
            .ok_or_else(|| Error::NotFound(format!("taxonomy {taxonomy}")))?;

        let mut assigned: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let resolved = match tax.find(name) {
                Some(term) => Some(term.name.clone()),
                None if create_missing => {
                    tax.terms.push(Term {
                        name: name.clone(),
                        slug: sanitize_slug(name),
                    });
                    Some(name.clone())
                },
                None => None,
            };
            if let Some(resolved) = resolved
                && !assigned.contains(&resolved)
            {
                assigned.push(resolved);
            }
        }

        if !names.is_empty() && assigned.is_empty() {
            return Ok(current);
        }

        let record = state.record_mut(id)?;
        if assigned.is_empty() {
            record.taxonomies.remove(taxonomy);
        } else {
            record
                .taxonomies
                .insert(taxonomy.to_string(), assigned.clone());
        }
        state.mutations += 1;
        Ok(assigned)
    }

    fn custom_field(&self, id: RecordId, name: &str) -> Result<Option<FieldValue>> {
        let state = self.read("custom_field")?;
        Ok(state.record(id)?.custom_fields.get(name).cloned())
    }

    fn set_custom_field(&self, id: RecordId, name: &str, value: &FieldValue) -> Result<()> {
        let mut state = self.write("set_custom_field")?;
        state
            .record_mut(id)?
            .custom_fields
            .insert(name.to_string(), value.clone());
        state.mutations += 1;
        Ok(())
    }

    fn custom_field_kind(&self, name: &str) -> Option<FieldKind> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.field_kinds.get(name).copied())
    }

    fn meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        let state = self.read("meta")?;
        Ok(state.record(id)?.meta.get(key).cloned())
    }

    fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        let mut state = self.write("set_meta")?;
        state
            .record_mut(id)?
            .meta
            .insert(key.to_string(), value.to_string());
        state.mutations += 1;
        Ok(())
    }

    fn featured_media(&self, id: RecordId) -> Result<Option<MediaRef>> {
        let state = self.read("featured_media")?;
        Ok(state.record(id)?.featured_media.clone())
    }

    fn set_featured_media(&self, id: RecordId, media: &MediaRef) -> Result<()> {
        let mut state = self.write("set_featured_media")?;
        state.record_mut(id)?.featured_media = Some(media.clone());
        state.mutations += 1;
        Ok(())
    }

    fn media_by_id(&self, media_id: u64) -> Result<Option<MediaRef>> {
        Ok(self.read("media_by_id")?.media.get(&media_id).cloned())
    }

    fn media_by_url(&self, url: &str) -> Result<Option<MediaRef>> {
        let state = self.read("media_by_url")?;
        Ok(state
            .media
            .values()
            .find(|m| m.url.as_deref() == Some(url))
            .cloned())
    }

    fn sideload_media(&self, url: &str) -> Result<MediaRef> {
        let mut state = self.write("sideload_media")?;
        if state.offline {
            return Err(Error::OperationFailed {
                operation: "sideload_media".to_string(),
                cause: format!("cannot fetch {url}: store is offline"),
            });
        }
        let id = state.allocate_id();
        let media = MediaRef::new(id, Some(url.to_string()));
        state.media.insert(id, media.clone());
        state.mutations += 1;
        Ok(media)
    }

    fn find_author(&self, login_or_email: &str) -> Result<Option<u64>> {
        let state = self.read("find_author")?;
        let needle = login_or_email.trim();
        Ok(state
            .authors
            .iter()
            .find(|a| a.login == needle || a.email.eq_ignore_ascii_case(needle))
            .map(|a| a.id))
    }

    fn list_records(&self, record_type: &str, statuses: &[String]) -> Result<Vec<ContentRecord>> {
        let state = self.read("list_records")?;
        Ok(state
            .records
            .values()
            .filter(|r| r.record_type() == record_type)
            .filter(|r| {
                statuses.is_empty()
                    || r.core
                        .status
                        .as_ref()
                        .is_some_and(|s| statuses.contains(s))
            })
            .cloned()
            .collect())
    }

    fn taxonomies_for_type(&self, record_type: &str) -> Result<Vec<String>> {
        let state = self.read("taxonomies_for_type")?;
        Ok(state
            .taxonomies
            .iter()
            .filter(|(_, t)| t.record_types.contains(record_type))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn custom_field_names(&self, record_type: &str) -> Result<Vec<String>> {
        let state = self.read("custom_field_names")?;
        let names: BTreeSet<&String> = state
            .records
            .values()
            .filter(|r| r.record_type() == record_type)
            .flat_map(|r| r.custom_fields.keys())
            .collect();
        Ok(names.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryRecordStore {
        InMemoryRecordStore::with_defaults()
    }

    #[test]
    fn test_create_and_resolve() {
        let store = store();
        let core = CoreFields {
            record_type: Some("post".to_string()),
            title: Some("Hello World".to_string()),
            ..CoreFields::default()
        };
        let id = store.create(&core).unwrap();
        let record = store.resolve(id).unwrap().unwrap();
        assert_eq!(record.core.slug.as_deref(), Some("hello-world"));
        assert_eq!(record.core.status.as_deref(), Some("draft"));
        assert_eq!(store.mutation_count(), 1);
    }

    #[test]
    fn test_create_rejects_blank_record() {
        let store = store();
        let core = CoreFields {
            record_type: Some("post".to_string()),
            ..CoreFields::default()
        };
        let err = store.create(&core).unwrap_err();
        assert!(matches!(err, Error::Rejected(ref m) if m == EMPTY_RECORD_MESSAGE));
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_update_missing_record() {
        let store = store();
        let result = store.update(RecordId::new(99), &CoreFields::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_set_terms_resolves_by_name_then_slug() {
        let store = store();
        store.register_term("category", "Product News", "product-news");
        let id = store.insert(ContentRecord::new("post", "A")).unwrap();

        let assigned = store
            .set_taxonomy_terms(id, "category", &["product news".to_string()], false)
            .unwrap();
        assert_eq!(assigned, vec!["Product News"]);

        let assigned = store
            .set_taxonomy_terms(id, "category", &["Product-News!".to_string()], false)
            .unwrap();
        assert_eq!(assigned, vec!["Product News"]);
    }

    #[test]
    fn test_set_terms_keeps_current_when_nothing_resolves() {
        let store = store();
        let id = store
            .insert(ContentRecord::new("post", "A").with_terms("category", ["News"]))
            .unwrap();

        let assigned = store
            .set_taxonomy_terms(id, "category", &["Unknown".to_string()], false)
            .unwrap();
        assert_eq!(assigned, vec!["News"]);
        assert_eq!(store.taxonomy_terms(id, "category").unwrap(), vec!["News"]);
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_set_terms_creates_missing_and_clears() {
        let store = store();
        let id = store.insert(ContentRecord::new("post", "A")).unwrap();

        store
            .set_taxonomy_terms(id, "category", &["Fresh".to_string()], true)
            .unwrap();
        assert!(store.term_names("category").contains(&"Fresh".to_string()));

        store.set_taxonomy_terms(id, "category", &[], false).unwrap();
        assert!(store.taxonomy_terms(id, "category").unwrap().is_empty());
    }

    #[test]
    fn test_offline_sideload_fails() {
        let store = store().offline();
        assert!(store.sideload_media("https://example.com/a.png").is_err());
    }

    #[test]
    fn test_media_lookup() {
        let store = store();
        let media = store.add_media("https://example.com/a.png").unwrap();
        assert_eq!(store.media_by_id(media.id).unwrap(), Some(media.clone()));
        assert_eq!(
            store.media_by_url("https://example.com/a.png").unwrap(),
            Some(media)
        );
        assert_eq!(store.media_by_url("https://example.com/b.png").unwrap(), None);
    }

    #[test]
    fn test_find_author_by_login_or_email() {
        let store = store();
        store.register_author(3, "editor", "Editor@Example.com");
        assert_eq!(store.find_author("editor").unwrap(), Some(3));
        assert_eq!(store.find_author("editor@example.com").unwrap(), Some(3));
        assert_eq!(store.find_author("nobody").unwrap(), None);
    }

    #[test]
    fn test_list_records_filters_status() {
        let store = store();
        store.insert(ContentRecord::new("post", "A").with_status("publish"));
        store.insert(ContentRecord::new("post", "B").with_status("draft"));
        store.insert(ContentRecord::new("page", "C").with_status("publish"));

        assert_eq!(store.list_records("post", &[]).unwrap().len(), 2);
        let published = store
            .list_records("post", &["publish".to_string()])
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].core.title.as_deref(), Some("A"));
    }
}
