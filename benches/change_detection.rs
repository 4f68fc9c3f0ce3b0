//! Benchmarks for change detection.
//!
//! Measures:
//! - Diffing prepared rows against stored records
//! - A full dry-run import of an unmodified export

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use quarry::io::services::IncomingRow;
use quarry::io::services::changes::TaxonomyCell;
use quarry::io::{ChangeDetector, ExportOptions, ExportService, read_csv};
use quarry::models::{ContentRecord, CoreFields, FieldKind, FieldValue};
use quarry::storage::InMemoryRecordStore;
use quarry::{ImportOptions, ImportService, RunContext};
use std::hint::black_box;
use std::sync::Arc;

const SIZES: &[usize] = &[100, 1_000, 5_000];

fn populated_store(count: usize) -> Arc<InMemoryRecordStore> {
    let store = Arc::new(InMemoryRecordStore::with_defaults());
    store.register_field("gallery", FieldKind::List);
    for i in 0..count {
        store.insert(
            ContentRecord::new("post", format!("Post number {i}"))
                .with_status(if i % 3 == 0 { "draft" } else { "publish" })
                .with_content(format!("Body of post {i}, with some text to compare."))
                .with_terms("category", ["News", "Updates"])
                .with_custom_field("gallery", FieldValue::list(["a", "b", "c"]))
                .with_meta("views", i.to_string()),
        );
    }
    store
}

fn incoming_rows(store: &InMemoryRecordStore) -> Vec<(ContentRecord, IncomingRow)> {
    use quarry::RecordStore;

    store
        .list_records("post", &[])
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let mut core = CoreFields {
                title: record.core.title.clone(),
                content: record.core.content.clone(),
                status: record.core.status.clone(),
                ..CoreFields::default()
            };
            // Every tenth row carries an edit.
            if i % 10 == 0 {
                core.title = Some(format!("Edited {i}"));
            }
            let incoming = IncomingRow {
                core,
                taxonomies: vec![TaxonomyCell {
                    header: "tax_category".to_string(),
                    taxonomy: "category".to_string(),
                    cell: "News, Updates".to_string(),
                }],
                ..IncomingRow::default()
            };
            (record, incoming)
        })
        .collect()
}

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");
    let detector = ChangeDetector::default();

    for &size in SIZES {
        let store = populated_store(size);
        let rows = incoming_rows(&store);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let mut changed = 0usize;
                for (current, incoming) in rows {
                    let changes = detector
                        .detect(&*store, current, black_box(incoming))
                        .unwrap();
                    changed += usize::from(!changes.is_empty());
                }
                black_box(changed)
            });
        });
    }

    group.finish();
}

fn bench_dry_run_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("dry_run_import");
    group.sample_size(20);

    for &size in SIZES {
        let store = populated_store(size);
        let mut csv = Vec::new();
        ExportService::new(store.clone())
            .export_to_writer(
                &mut csv,
                &ExportOptions::for_type("post").with_meta_keys(vec!["views".to_string()]),
            )
            .unwrap();
        let service = ImportService::new(store.clone());
        let options = ImportOptions::default().with_dry_run(true);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &csv, |b, csv| {
            b.iter(|| {
                let table = read_csv(csv.as_slice()).unwrap();
                let mut context = RunContext::in_memory();
                let result = service
                    .import_table(table, &options, &mut context, None)
                    .unwrap();
                black_box(result.skipped)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_detect, bench_dry_run_import);
criterion_main!(benches);
