//! CSV import/export subsystem.
//!
//! # Architecture
//!
//! - **[`csv`]** reads and writes CSV files, yielding header-keyed rows
//! - **[`columns`]** resolves each header once into a [`Column`]
//! - **[`codec`]** maps typed field values to and from single cells
//! - **[`validation`]** checks the header before any row is imported
//! - **[`services`]** detects changes, imports rows and drives whole runs
//! - **[`run_log`]** keeps the per-run context and durable log
//!
//! # Examples
//!
//! ## Import a CSV
//!
//! ```rust,ignore
//! use quarry::io::{ImportOptions, ImportService, RunContext};
//!
//! let service = ImportService::new(store);
//! let mut context = RunContext::new(&log_dir)?;
//! let result = service.import_file(path, &ImportOptions::default(), &mut context, None)?;
//! println!("{} created, {} updated", result.created, result.updated);
//! ```
//!
//! ## Export records to CSV
//!
//! ```rust,ignore
//! use quarry::io::{ExportOptions, ExportService};
//!
//! let result = ExportService::new(store).export_to_file(path, &ExportOptions::for_type("post"))?;
//! println!("Exported {} records", result.exported);
//! ```

pub mod codec;
pub mod columns;
pub mod csv;
pub mod run_log;
pub mod services;
pub mod validation;

pub use codec::{DecodeResult, FieldCodec};
pub use columns::{Column, ColumnPrefixes, ColumnSchema, suggest_field_mapping};
pub use csv::{CsvRow, CsvTable, read_csv, read_csv_file, write_csv};
pub use run_log::{RunContext, RunLog};
pub use services::{
    ChangeDetector, ExportOptions, ExportResult, ExportService, ImportOptions, ImportResult,
    ImportService, ProgressCallback, RowError, RowFailure, RowImporter, RowOutcome, RowReport,
};
pub use validation::{HeaderValidator, ValidationIssue, ValidationResult, ValidationSeverity};
