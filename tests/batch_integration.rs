//! Batch controller behaviour against a store that fails on chosen rows.
//!
//! Covers what a well-behaved store cannot trigger:
//! - Store rejections are recorded per row with the store's message
//! - Backend faults are reported as unexpected failures
//! - The run continues past a failed row, or halts when configured to
//! - Store resources are released once per chunk

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use quarry::io::read_csv;
use quarry::models::{ContentRecord, CoreFields, FieldKind, FieldValue, MediaRef, RecordId};
use quarry::storage::InMemoryRecordStore;
use quarry::{Error, ImportOptions, ImportResult, ImportService, RecordStore, Result, RunContext};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy)]
enum Fault {
    Rejected(&'static str),
    Backend(&'static str),
}

impl Fault {
    fn into_error(self, operation: &str) -> Error {
        match self {
            Self::Rejected(message) => Error::Rejected(message.to_string()),
            Self::Backend(cause) => Error::OperationFailed {
                operation: operation.to_string(),
                cause: cause.to_string(),
            },
        }
    }
}

/// Delegates to an in-memory store, failing writes of chosen titles.
struct FaultyStore {
    inner: InMemoryRecordStore,
    faults: BTreeMap<&'static str, Fault>,
    releases: AtomicUsize,
}

impl FaultyStore {
    fn new(faults: &[(&'static str, Fault)]) -> Self {
        Self {
            inner: InMemoryRecordStore::with_defaults(),
            faults: faults.iter().copied().collect(),
            releases: AtomicUsize::new(0),
        }
    }

    fn check(&self, operation: &str, core: &CoreFields) -> Result<()> {
        match core.title.as_deref().and_then(|t| self.faults.get(t)) {
            Some(fault) => Err(fault.into_error(operation)),
            None => Ok(()),
        }
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl RecordStore for FaultyStore {
    fn resolve(&self, id: RecordId) -> Result<Option<ContentRecord>> {
        self.inner.resolve(id)
    }

    fn create(&self, core: &CoreFields) -> Result<RecordId> {
        self.check("create", core)?;
        self.inner.create(core)
    }

    fn update(&self, id: RecordId, core: &CoreFields) -> Result<()> {
        self.check("update", core)?;
        self.inner.update(id, core)
    }

    fn type_exists(&self, record_type: &str) -> Result<bool> {
        self.inner.type_exists(record_type)
    }

    fn taxonomy_exists(&self, taxonomy: &str) -> Result<bool> {
        self.inner.taxonomy_exists(taxonomy)
    }

    fn taxonomy_terms(&self, id: RecordId, taxonomy: &str) -> Result<Vec<String>> {
        self.inner.taxonomy_terms(id, taxonomy)
    }

    fn set_taxonomy_terms(
        &self,
        id: RecordId,
        taxonomy: &str,
        names: &[String],
        create_missing: bool,
    ) -> Result<Vec<String>> {
        self.inner
            .set_taxonomy_terms(id, taxonomy, names, create_missing)
    }

    fn custom_field(&self, id: RecordId, name: &str) -> Result<Option<FieldValue>> {
        self.inner.custom_field(id, name)
    }

    fn set_custom_field(&self, id: RecordId, name: &str, value: &FieldValue) -> Result<()> {
        self.inner.set_custom_field(id, name, value)
    }

    fn custom_field_kind(&self, name: &str) -> Option<FieldKind> {
        self.inner.custom_field_kind(name)
    }

    fn meta(&self, id: RecordId, key: &str) -> Result<Option<String>> {
        self.inner.meta(id, key)
    }

    fn set_meta(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        self.inner.set_meta(id, key, value)
    }

    fn featured_media(&self, id: RecordId) -> Result<Option<MediaRef>> {
        self.inner.featured_media(id)
    }

    fn set_featured_media(&self, id: RecordId, media: &MediaRef) -> Result<()> {
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
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.inner.release_resources();
    }
}

fn import(
    store: &Arc<FaultyStore>,
    csv: &str,
    options: &ImportOptions,
) -> (ImportResult, RunContext) {
    let mut context = RunContext::in_memory();
    let result = ImportService::new(store.clone())
        .import_table(read_csv(csv.as_bytes()).unwrap(), options, &mut context, None)
        .unwrap();
    (result, context)
}

fn titles(store: &FaultyStore) -> Vec<String> {
    store
        .list_records("post", &[])
        .unwrap()
        .into_iter()
        .filter_map(|r| r.core.title)
        .collect()
}

const REFUSAL: &str = "Sorry, you are not allowed to edit this post.";

#[test]
fn test_store_rejection_is_recorded_verbatim() {
    let store = Arc::new(FaultyStore::new(&[("Refused", Fault::Rejected(REFUSAL))]));
    let csv = "post_title,post_type\nOne,post\nRefused,post\nThree,post\n";

    let (result, context) = import(&store, csv, &ImportOptions::default());

    assert_eq!(result.created, 2);
    assert_eq!(result.failed, 1);
    assert!(!result.halted);
    assert_eq!(result.errors[0].row, 3);
    assert_eq!(result.errors[0].title, "Refused");
    assert_eq!(result.errors[0].message, REFUSAL);
    assert_eq!(titles(&store), vec!["One", "Three"]);

    let lines = context.log().lines().unwrap();
    assert!(
        lines
            .iter()
            .any(|l| l.contains("Row 3: FAILED") && l.ends_with(REFUSAL))
    );
}

#[test]
fn test_backend_fault_is_reported_as_unexpected() {
    let store = Arc::new(FaultyStore::new(&[("Broken", Fault::Backend("disk full"))]));
    let csv = "post_title,post_type\nBroken,post\nAfter,post\n";

    let (result, _) = import(&store, csv, &ImportOptions::default());

    assert_eq!(result.failed, 1);
    assert_eq!(result.created, 1);
    let message = &result.errors[0].message;
    assert!(message.starts_with("unexpected failure:"), "{message}");
    assert!(message.contains("disk full"), "{message}");
    assert_eq!(titles(&store), vec!["After"]);
}

#[test]
fn test_update_rejection_leaves_record_intact() {
    let store = Arc::new(FaultyStore::new(&[("Renamed", Fault::Rejected(REFUSAL))]));
    let id = store
        .create(&CoreFields {
            record_type: Some("post".to_string()),
            title: Some("Original".to_string()),
            ..CoreFields::default()
        })
        .unwrap();
    let csv = format!("ID,post_title\n{id},Renamed\n");

    let (result, _) = import(&store, &csv, &ImportOptions::default());

    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].identity, Some(id));
    assert_eq!(result.errors[0].message, REFUSAL);
    let record = store.resolve(id).unwrap().unwrap();
    assert_eq!(record.core.title.as_deref(), Some("Original"));
}

#[test]
fn test_resources_released_once_per_chunk() {
    let store = Arc::new(FaultyStore::new(&[]));
    let csv = "post_title,post_type\nA,post\nB,post\nC,post\nD,post\nE,post\n";

    let (result, _) = import(&store, csv, &ImportOptions::default().with_batch_size(2));

    assert_eq!(result.created, 5);
    assert_eq!(store.releases(), 3);
}

#[test]
fn test_halted_run_releases_the_attempted_chunk_only() {
    let store = Arc::new(FaultyStore::new(&[("B", Fault::Rejected(REFUSAL))]));
    let csv = "post_title,post_type\nA,post\nB,post\nC,post\nD,post\nE,post\n";
    let options = ImportOptions::default()
        .with_batch_size(2)
        .with_skip_on_error(false);

    let (result, _) = import(&store, csv, &options);

    assert!(result.halted);
    assert_eq!(result.processed(), 2);
    assert_eq!(result.errors[0].message, REFUSAL);
    assert_eq!(store.releases(), 1);
    assert_eq!(titles(&store), vec!["A"]);
}

#[test]
fn test_untitled_failure_uses_placeholder() {
    let store = Arc::new(FaultyStore::new(&[]));
    let csv = "ID,post_content\n777,orphan body\n";

    let (result, context) = import(
        &store,
        csv,
        &ImportOptions::default().with_update_existing(false),
    );

    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].title, "untitled");
    let lines = context.log().lines().unwrap();
    assert!(lines.iter().any(|l| l.contains("FAILED (ID 777) \"untitled\"")));
}
