//! CSV import service.
//!
//! Drives every row of a CSV through the [`RowImporter`] in file order,
//! isolating failures per row and accumulating an [`ImportResult`].

#![allow(clippy::cast_precision_loss)]

use super::row::{RowFailure, RowImporter, RowOutcome, RowReport};
use crate::io::columns::{ColumnPrefixes, ColumnSchema};
use crate::io::csv::{CsvRow, CsvTable, read_csv_file};
use crate::io::run_log::RunContext;
use crate::io::validation::HeaderValidator;
use crate::models::{ChangeSet, CoreField, FieldKind, RecordId};
use crate::storage::RecordStore;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Characters of the title kept in logs and error records.
pub const TITLE_SNIPPET_CHARS: usize = 50;

/// Snippet of a row without a title.
pub const UNTITLED_SNIPPET: &str = "untitled";

/// Options for a CSV import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Update records whose ID resolves; otherwise every row creates.
    pub update_existing: bool,
    /// Create taxonomy terms that do not exist yet.
    pub create_taxonomies: bool,
    /// Continue after a failed row.
    pub skip_on_error: bool,
    /// Detect changes and validate without writing.
    pub dry_run: bool,
    /// Rows per chunk between progress reports and cache releases.
    pub batch_size: usize,
    /// Record type that overrides the row's `post_type`.
    pub default_type: Option<String>,
    /// Status of created records whose row has none.
    pub default_status: String,
    /// Author of created records whose row has none.
    pub default_author: Option<u64>,
    /// Core fields compared on update.
    pub checked_fields: Vec<CoreField>,
    /// Header renames applied before columns are resolved.
    pub mapping: BTreeMap<String, String>,
    /// Column prefixes of dynamic fields.
    pub prefixes: ColumnPrefixes,
    /// Declared custom field kinds; take precedence over the store's.
    pub field_kinds: BTreeMap<String, FieldKind>,
    /// Number of errors shown in summaries.
    pub error_preview_limit: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            update_existing: true,
            create_taxonomies: true,
            skip_on_error: true,
            dry_run: false,
            batch_size: 100,
            default_type: None,
            default_status: "draft".to_string(),
            default_author: None,
            checked_fields: CoreField::default_checked().to_vec(),
            mapping: BTreeMap::new(),
            prefixes: ColumnPrefixes::default(),
            field_kinds: BTreeMap::new(),
            error_preview_limit: 10,
        }
    }
}

impl ImportOptions {
    /// Enables or disables dry run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets whether the run continues after a failed row.
    #[must_use]
    pub const fn with_skip_on_error(mut self, skip: bool) -> Self {
        self.skip_on_error = skip;
        self
    }

    /// Sets whether existing records are updated.
    #[must_use]
    pub const fn with_update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the record type override.
    #[must_use]
    pub fn with_default_type(mut self, record_type: impl Into<String>) -> Self {
        self.default_type = Some(record_type.into());
        self
    }

    /// Adds a header rename.
    #[must_use]
    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.mapping.insert(from.into(), to.into());
        self
    }
}

/// A failed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Spreadsheet line number (header is line 1).
    pub row: usize,
    /// Identity the row asked for.
    pub identity: Option<RecordId>,
    /// Title snippet.
    pub title: String,
    /// What went wrong.
    pub message: String,
}

/// Dry-run preview of one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowPreview {
    /// Spreadsheet line number.
    pub row: usize,
    /// Identity of the record, when it exists.
    pub identity: Option<RecordId>,
    /// Title snippet.
    pub title: String,
    /// Outcome the row would have.
    pub outcome: String,
    /// Changes an update would apply.
    pub changes: ChangeSet,
}

/// Result of an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// Rows created, updated or skipped.
    pub success: usize,
    /// Records created.
    pub created: usize,
    /// Records updated.
    pub updated: usize,
    /// Rows that matched their record.
    pub skipped: usize,
    /// Rows that failed.
    pub failed: usize,
    /// Every failed row, in file order.
    pub errors: Vec<RowError>,
    /// Base name of the run log.
    pub log_file: Option<String>,
    /// Rows in the file.
    pub total_rows: usize,
    /// Rows dropped by the reader for a column-count mismatch.
    pub dropped_rows: usize,
    /// True when the run stopped at a failure.
    pub halted: bool,
    /// True for a dry run.
    pub dry_run: bool,
    /// Per-row previews of a dry run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<RowPreview>,
}

impl ImportResult {
    /// Creates an empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            success: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            errors: Vec::new(),
            log_file: None,
            total_rows: 0,
            dropped_rows: 0,
            halted: false,
            dry_run: false,
            previews: Vec::new(),
        }
    }

    /// Returns the number of rows attempted.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.success + self.failed
    }

    /// Returns whether any row failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the first `limit` errors.
    #[must_use]
    pub fn error_preview(&self, limit: usize) -> &[RowError] {
        &self.errors[..self.errors.len().min(limit)]
    }

    /// Returns the percentage of rows attempted.
    #[must_use]
    pub fn percent_complete(&self) -> f32 {
        if self.total_rows == 0 {
            100.0
        } else {
            (self.processed() as f32 / self.total_rows as f32) * 100.0
        }
    }

    fn record_success(&mut self, outcome: RowOutcome) {
        self.success += 1;
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Skipped => self.skipped += 1,
        }
    }

    fn record_failure(&mut self, error: RowError) {
        self.failed += 1;
        self.errors.push(error);
    }
}

/// Progress callback, invoked after each chunk with the percentage of rows
/// attempted and the running result.
pub type ProgressCallback = Box<dyn Fn(f32, &ImportResult) + Send>;

/// Service importing CSV files into a record store.
pub struct ImportService {
    store: Arc<dyn RecordStore>,
}

impl ImportService {
    /// Creates an import service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Imports a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its header is invalid.
    /// Row failures are reported in the result, never as an error.
    pub fn import_file(
        &self,
        path: &Path,
        options: &ImportOptions,
        context: &mut RunContext,
        progress: Option<ProgressCallback>,
    ) -> Result<ImportResult> {
        context.record(&format!("Reading {}", path.display()));
        let table = read_csv_file(path)?;
        self.import_table(table, options, context, progress)
    }

    /// Imports parsed CSV rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid or the store cannot be
    /// queried before the first row.
    #[instrument(
        skip_all,
        fields(run_id = %context.run_id, rows = table.rows.len(), dry_run = options.dry_run)
    )]
    pub fn import_table(
        &self,
        mut table: CsvTable,
        options: &ImportOptions,
        context: &mut RunContext,
        progress: Option<ProgressCallback>,
    ) -> Result<ImportResult> {
        let start = Instant::now();
        table.apply_mapping(&options.mapping);

        let store = self.store.as_ref();
        let schema = ColumnSchema::resolve(&table.headers, &options.prefixes, |name| {
            options
                .field_kinds
                .get(name)
                .copied()
                .or_else(|| store.custom_field_kind(name))
        });

        let validation = HeaderValidator::new()
            .with_default_type(options.default_type.is_some())
            .validate(&table.headers, &schema);
        for warning in validation.warnings() {
            tracing::warn!(column = %warning.field, "{}", warning.message);
            context.record(&format!("Warning: {}: {}", warning.field, warning.message));
        }
        if !validation.is_valid() {
            let message = validation
                .errors()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            context.record(&format!("Import aborted: {message}"));
            return Err(Error::InvalidInput(message));
        }

        let importer = RowImporter::new(store, &schema, options)?;
        for taxonomy in importer.unknown_taxonomies() {
            context.record(&format!("Warning: taxonomy '{taxonomy}' does not exist; column ignored"));
        }

        let mut result = ImportResult {
            total_rows: table.rows.len(),
            dropped_rows: table.dropped,
            log_file: context.log_file(),
            dry_run: options.dry_run,
            ..ImportResult::new()
        };

        context.record(&format!(
            "Import started: {} rows{}",
            result.total_rows,
            if options.dry_run { " (dry run)" } else { "" }
        ));
        if table.dropped > 0 {
            context.record(&format!(
                "Dropped {} rows with a column count different from the header",
                table.dropped
            ));
        }

        let batch_size = options.batch_size.max(1);
        'chunks: for (chunk_index, chunk) in table.rows.chunks(batch_size).enumerate() {
            for (offset, row) in chunk.iter().enumerate() {
                let row_number = chunk_index * batch_size + offset + 2;
                let keep_going = process_row(&importer, row, row_number, options, context, &mut result);
                if !keep_going {
                    result.halted = true;
                    context.record(&format!(
                        "Import halted at row {row_number}; {} rows not attempted",
                        result.total_rows - result.processed()
                    ));
                    break 'chunks;
                }
            }

            store.release_resources();
            if let Some(callback) = &progress {
                callback(result.percent_complete(), &result);
            }
        }
        if result.halted {
            store.release_resources();
            if let Some(callback) = &progress {
                callback(result.percent_complete(), &result);
            }
        }

        context.record(&format!(
            "Import finished: {} created, {} updated, {} skipped, {} failed",
            result.created, result.updated, result.skipped, result.failed
        ));
        metrics::histogram!("import_run_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            failed = result.failed,
            halted = result.halted,
            "Import finished"
        );
        Ok(result)
    }
}

/// Processes one row; returns false when the run must stop.
fn process_row(
    importer: &RowImporter<'_>,
    row: &CsvRow,
    row_number: usize,
    options: &ImportOptions,
    context: &mut RunContext,
    result: &mut ImportResult,
) -> bool {
    let identity = importer.row_identity(row);
    let title = title_snippet(importer.row_title(row).unwrap_or_default());
    let attempted = identity.map_or_else(|| "new".to_string(), |id| format!("ID {id}"));

    match importer.import(row) {
        Ok(report) => {
            metrics::counter!("import_rows_total", "outcome" => report.outcome.as_str())
                .increment(1);
            context.record(&describe_success(row_number, &attempted, &title, &report));
            if options.dry_run {
                result.previews.push(RowPreview {
                    row: row_number,
                    identity: report.id,
                    title,
                    outcome: report.outcome.as_str().to_string(),
                    changes: report.changes.clone(),
                });
            }
            result.record_success(report.outcome);
            true
        },
        Err(failure) => {
            metrics::counter!("import_rows_total", "outcome" => "failed").increment(1);
            let message = failure.to_string();
            if matches!(failure, RowFailure::Unexpected(_)) {
                tracing::warn!(row = row_number, "{message}");
            } else {
                tracing::debug!(row = row_number, "{message}");
            }
            context.record(&format!(
                "Row {row_number}: FAILED ({attempted}) \"{title}\": {message}"
            ));
            result.record_failure(RowError {
                row: row_number,
                identity,
                title,
                message,
            });
            options.skip_on_error
        },
    }
}

fn describe_success(row_number: usize, attempted: &str, title: &str, report: &RowReport) -> String {
    let id = report
        .id
        .map_or_else(|| "pending".to_string(), |id| id.to_string());
    let mut line = format!(
        "Row {row_number}: {} ({attempted}) \"{title}\" -> ID {id}",
        report.outcome
    );
    if !report.changes.is_empty() {
        line.push_str(&format!(" [{}]", report.changes));
    }
    line
}

/// Truncates a title for logs and error records.
///
/// A blank title becomes [`UNTITLED_SNIPPET`].
#[must_use]
pub fn title_snippet(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        UNTITLED_SNIPPET.to_string()
    } else if title.chars().count() > TITLE_SNIPPET_CHARS {
        let cut: String = title.chars().take(TITLE_SNIPPET_CHARS).collect();
        format!("{cut}...")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::csv::read_csv;
    use crate::models::ContentRecord;
    use crate::storage::InMemoryRecordStore;
    use std::sync::Mutex;

    fn service() -> (ImportService, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::with_defaults());
        (ImportService::new(store.clone()), store)
    }

    fn table(csv: &str) -> CsvTable {
        read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_import_options_defaults() {
        let options = ImportOptions::default();
        assert!(options.update_existing);
        assert!(options.create_taxonomies);
        assert!(options.skip_on_error);
        assert!(!options.dry_run);
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.default_status, "draft");
    }

    #[test]
    fn test_counts_are_consistent() {
        let (service, _) = service();
        let mut context = RunContext::in_memory();
        let result = service
            .import_table(
                table("post_title,post_type\nA,post\nB,bogus\nC,post\n"),
                &ImportOptions::default(),
                &mut context,
                None,
            )
            .unwrap();
        assert_eq!(result.created, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.success, result.created + result.updated + result.skipped);
        assert_eq!(result.processed(), 3);
        assert_eq!(result.errors[0].row, 3);
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let (service, _) = service();
        let mut context = RunContext::in_memory();
        let err = service
            .import_table(
                table("post_content\nbody\n"),
                &ImportOptions::default(),
                &mut context,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_mapping_renames_headers() {
        let (service, store) = service();
        let mut context = RunContext::in_memory();
        let options = ImportOptions::default()
            .with_mapping("Title", "post_title")
            .with_default_type("post");
        let result = service
            .import_table(table("Title\nMapped\n"), &options, &mut context, None)
            .unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn test_mapping_is_applied_once_per_header() {
        let (service, store) = service();
        let mut context = RunContext::in_memory();
        let options = ImportOptions::default()
            .with_mapping("Summary", "post_content")
            .with_mapping("post_content", "post_excerpt");
        let result = service
            .import_table(
                table("post_title,Summary,post_content,post_type\nT,new body,short excerpt,post\n"),
                &options,
                &mut context,
                None,
            )
            .unwrap();
        assert_eq!(result.created, 1);

        let record = &store.list_records("post", &[]).unwrap()[0];
        assert_eq!(record.core.content.as_deref(), Some("new body"));
        assert_eq!(record.core.excerpt.as_deref(), Some("short excerpt"));
    }

    #[test]
    fn test_progress_called_per_chunk() {
        let (service, _) = service();
        let mut context = RunContext::in_memory();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let progress: ProgressCallback = Box::new(move |percent, result| {
            if let Ok(mut calls) = sink.lock() {
                calls.push((percent, result.processed()));
            }
        });

        service
            .import_table(
                table("post_title,post_type\nA,post\nB,post\nC,post\n"),
                &ImportOptions::default().with_batch_size(2),
                &mut context,
                Some(progress),
            )
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 2);
        assert!((calls[1].0 - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_dry_run_collects_previews() {
        let (service, store) = service();
        let id = store.insert(ContentRecord::new("post", "Hello")).unwrap();
        let mut context = RunContext::in_memory();
        let csv = format!("ID,post_title\n{id},Hello again\n");
        let result = service
            .import_table(
                table(&csv),
                &ImportOptions::default().with_dry_run(true),
                &mut context,
                None,
            )
            .unwrap();
        assert!(result.dry_run);
        assert_eq!(result.updated, 1);
        assert_eq!(result.previews.len(), 1);
        assert_eq!(result.previews[0].changes.fields(), vec!["post_title"]);
        assert_eq!(store.mutation_count(), 0);
    }

    #[test]
    fn test_run_log_records_rows() {
        let (service, _) = service();
        let mut context = RunContext::in_memory();
        service
            .import_table(
                table("post_title,post_type\nLogged,post\n"),
                &ImportOptions::default(),
                &mut context,
                None,
            )
            .unwrap();
        let lines = context.log().lines().unwrap();
        assert!(lines.iter().any(|l| l.contains("Row 2: created (new) \"Logged\"")));
        assert!(lines.last().unwrap().contains("Import finished"));
    }

    #[test]
    fn test_title_snippet() {
        assert_eq!(title_snippet("  short "), "short");
        assert_eq!(title_snippet("   "), UNTITLED_SNIPPET);
        let long = "x".repeat(60);
        let snippet = title_snippet(&long);
        assert_eq!(snippet.chars().count(), TITLE_SNIPPET_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_error_preview_is_capped() {
        let mut result = ImportResult::new();
        for row in 0..15 {
            result.record_failure(RowError {
                row,
                identity: None,
                title: String::new(),
                message: "bad".to_string(),
            });
        }
        assert_eq!(result.error_preview(10).len(), 10);
        assert_eq!(result.failed, 15);
    }
}
