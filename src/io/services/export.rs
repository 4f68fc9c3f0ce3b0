//! CSV export service.
//!
//! Writes records of one type using the same column conventions and cell
//! encodings the importer reads, so an unmodified export re-imports with
//! every row skipped.

use crate::io::codec::{encode_terms, encode_value};
use crate::io::columns::{ColumnPrefixes, FEATURED_MEDIA_COLUMN, ID_COLUMN};
use crate::io::csv::write_csv;
use crate::models::{ContentRecord, CoreField, DATETIME_FORMAT};
use crate::storage::RecordStore;
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Options for a CSV export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Record type to export.
    pub record_type: String,
    /// Statuses to include; empty includes all.
    pub statuses: Vec<String>,
    /// Taxonomies to include; `None` includes every taxonomy of the type.
    pub taxonomies: Option<Vec<String>>,
    /// Custom fields to include; `None` includes every field in use.
    pub custom_fields: Option<Vec<String>>,
    /// Meta keys to include.
    pub meta_keys: Vec<String>,
    /// Column prefixes of dynamic fields.
    pub prefixes: ColumnPrefixes,
    /// Maximum number of records to export.
    pub limit: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            record_type: "post".to_string(),
            statuses: Vec::new(),
            taxonomies: None,
            custom_fields: None,
            meta_keys: Vec::new(),
            prefixes: ColumnPrefixes::default(),
            limit: None,
        }
    }
}

impl ExportOptions {
    /// Creates export options for a record type.
    #[must_use]
    pub fn for_type(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            ..Self::default()
        }
    }

    /// Restricts the export to the given statuses.
    #[must_use]
    pub fn with_statuses(mut self, statuses: Vec<String>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Adds meta keys to export.
    #[must_use]
    pub fn with_meta_keys(mut self, keys: Vec<String>) -> Self {
        self.meta_keys = keys;
        self
    }

    /// Sets the maximum number of records to export.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of an export operation.
#[derive(Debug, Clone, Default)]
pub struct ExportResult {
    /// Number of records exported.
    pub exported: usize,
    /// Number of columns written.
    pub columns: usize,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

/// Service exporting records to CSV.
pub struct ExportService {
    store: Arc<dyn RecordStore>,
}

impl ExportService {
    /// Creates an export service.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Exports records to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the store fails.
    pub fn export_to_file(&self, path: &Path, options: &ExportOptions) -> Result<ExportResult> {
        let file = std::fs::File::create(path).map_err(|e| Error::OperationFailed {
            operation: "create_export_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let mut result = self.export_to_writer(std::io::BufWriter::new(file), options)?;
        result.output_path = Some(path.display().to_string());
        Ok(result)
    }

    /// Exports records to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the store fails.
    #[instrument(skip(self, writer, options), fields(record_type = %options.record_type))]
    pub fn export_to_writer<W: Write>(
        &self,
        writer: W,
        options: &ExportOptions,
    ) -> Result<ExportResult> {
        let (headers, rows) = self.build_table(options)?;
        write_csv(writer, &headers, &rows)?;
        tracing::info!(exported = rows.len(), columns = headers.len(), "Export finished");
        metrics::counter!("export_records_total").increment(rows.len() as u64);
        Ok(ExportResult {
            exported: rows.len(),
            columns: headers.len(),
            output_path: None,
        })
    }

    /// Builds the header and the encoded rows of an export.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn build_table(&self, options: &ExportOptions) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let store = self.store.as_ref();
        let mut records = store.list_records(&options.record_type, &options.statuses)?;
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }

        let taxonomies = match &options.taxonomies {
            Some(list) => list.clone(),
            None => store.taxonomies_for_type(&options.record_type)?,
        };
        let custom_fields = match &options.custom_fields {
            Some(list) => list.clone(),
            None => store.custom_field_names(&options.record_type)?,
        };

        let mut headers = vec![ID_COLUMN.to_string()];
        headers.extend(CoreField::all().iter().map(|f| f.column_name().to_string()));
        headers.push(FEATURED_MEDIA_COLUMN.to_string());
        let prefixes = &options.prefixes;
        headers.extend(taxonomies.iter().map(|t| prefixes.taxonomy_column(t)));
        headers.extend(custom_fields.iter().map(|f| prefixes.custom_column(f)));
        headers.extend(options.meta_keys.iter().map(|k| prefixes.meta_column(k)));

        let rows = records
            .iter()
            .map(|record| encode_record(record, &taxonomies, &custom_fields, &options.meta_keys))
            .collect();
        Ok((headers, rows))
    }
}

fn encode_record(
    record: &ContentRecord,
    taxonomies: &[String],
    custom_fields: &[String],
    meta_keys: &[String],
) -> Vec<String> {
    let mut row = vec![record.id.map(|id| id.to_string()).unwrap_or_default()];
    row.extend(CoreField::all().iter().map(|field| match field {
        CoreField::Modified => record
            .modified
            .map(|m| m.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
        other => record.core.field_string(*other),
    }));
    row.push(
        record
            .featured_media
            .as_ref()
            .map(|m| m.locator())
            .unwrap_or_default(),
    );
    row.extend(taxonomies.iter().map(|t| {
        record
            .taxonomies
            .get(t)
            .map(|names| encode_terms(names))
            .unwrap_or_default()
    }));
    row.extend(custom_fields.iter().map(|f| {
        record
            .custom_fields
            .get(f)
            .map(encode_value)
            .unwrap_or_default()
    }));
    row.extend(
        meta_keys
            .iter()
            .map(|k| record.meta.get(k).cloned().unwrap_or_default()),
    );
    row
}
