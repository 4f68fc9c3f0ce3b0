//! Import and export against the `SQLite` store.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use quarry::io::{ExportOptions, ExportService, read_csv};
use quarry::models::{FieldKind, FieldValue};
use quarry::storage::{CachedRecordStore, DEFAULT_CACHE_CAPACITY, SqliteRecordStore};
use quarry::{ImportOptions, ImportResult, ImportService, RecordStore, RunContext};
use std::sync::Arc;

fn prepared(store: SqliteRecordStore) -> SqliteRecordStore {
    store.register_type("post").unwrap();
    store.register_type("page").unwrap();
    store.register_taxonomy("category", &["post"]).unwrap();
    store.register_field("gallery", FieldKind::List).unwrap();
    store.register_field("specs", FieldKind::Structured).unwrap();
    store.register_author(3, "editor", "editor@example.com").unwrap();
    store
}

fn import(store: Arc<dyn RecordStore>, csv: &str, options: &ImportOptions) -> ImportResult {
    let mut context = RunContext::in_memory();
    ImportService::new(store)
        .import_table(read_csv(csv.as_bytes()).unwrap(), options, &mut context, None)
        .unwrap()
}

const SOURCE: &str = "post_title,post_type,post_status,post_author,tax_category,acf_gallery,acf_specs,meta_views\n\
    Alpha,post,publish,editor,\"News, Updates\",a|b,\"{\"\"size\"\": 2}\",10\n\
    Beta,post,,3,News,,,\n\
    About,page,publish,,,,,\n";

#[test]
fn test_import_then_export_round_trip() {
    let store: Arc<dyn RecordStore> = Arc::new(prepared(SqliteRecordStore::in_memory().unwrap()));
    let first = import(store.clone(), SOURCE, &ImportOptions::default());
    assert_eq!(first.created, 3, "errors: {:?}", first.errors);

    let posts = store.list_records("post", &[]).unwrap();
    assert_eq!(posts.len(), 2);
    let alpha = posts
        .iter()
        .find(|r| r.core.title.as_deref() == Some("Alpha"))
        .unwrap();
    let id = alpha.id.unwrap();
    assert_eq!(alpha.core.author, Some(3));
    assert_eq!(
        store.custom_field(id, "gallery").unwrap(),
        Some(FieldValue::list(["a", "b"]))
    );
    assert_eq!(store.meta(id, "views").unwrap().as_deref(), Some("10"));

    let beta = posts
        .iter()
        .find(|r| r.core.title.as_deref() == Some("Beta"))
        .unwrap();
    assert_eq!(beta.core.status.as_deref(), Some("draft"));

    let mut out = Vec::new();
    ExportService::new(store.clone())
        .export_to_writer(
            &mut out,
            &ExportOptions::for_type("post").with_meta_keys(vec!["views".to_string()]),
        )
        .unwrap();
    let exported = String::from_utf8(out).unwrap();

    let second = import(store, &exported, &ImportOptions::default());
    assert_eq!(second.skipped, 2, "errors: {:?}", second.errors);
    assert_eq!(second.updated, 0);
}

#[test]
fn test_edit_through_cache_is_visible() {
    let inner = prepared(SqliteRecordStore::in_memory().unwrap());
    let store: Arc<dyn RecordStore> = Arc::new(CachedRecordStore::new(inner, DEFAULT_CACHE_CAPACITY));
    import(store.clone(), SOURCE, &ImportOptions::default());
    let id = store.list_records("page", &[]).unwrap()[0].id.unwrap();

    let csv = format!("ID,post_title\n{id},About us\n");
    let result = import(store.clone(), &csv, &ImportOptions::default());
    assert_eq!(result.updated, 1);

    let record = store.resolve(id).unwrap().unwrap();
    assert_eq!(record.core.title.as_deref(), Some("About us"));
    assert_eq!(record.core.status.as_deref(), Some("publish"));
}

#[test]
fn test_records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site").join("quarry.db");

    {
        let store: Arc<dyn RecordStore> = Arc::new(prepared(SqliteRecordStore::new(&path).unwrap()));
        let result = import(store, SOURCE, &ImportOptions::default());
        assert_eq!(result.created, 3);
    }

    let reopened = SqliteRecordStore::new(&path).unwrap();
    assert_eq!(reopened.list_records("post", &[]).unwrap().len(), 2);
    let published = reopened
        .list_records("post", &["publish".to_string()])
        .unwrap();
    assert_eq!(published.len(), 1);
    let id = published[0].id.unwrap();
    let mut terms = reopened.taxonomy_terms(id, "category").unwrap();
    terms.sort();
    assert_eq!(terms, vec!["News", "Updates"]);
}

#[test]
fn test_unknown_identity_creates_new_record() {
    let store: Arc<dyn RecordStore> = Arc::new(prepared(SqliteRecordStore::in_memory().unwrap()));
    let result = import(
        store.clone(),
        "ID,post_title,post_type\n9999,Orphan,post\n",
        &ImportOptions::default(),
    );
    assert_eq!(result.created, 1);
    let records = store.list_records("post", &[]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].core.title.as_deref(), Some("Orphan"));
}
