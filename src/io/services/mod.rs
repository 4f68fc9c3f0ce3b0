//! Import and export service implementations.
//!
//! The import side is layered: [`changes`] diffs one row against the stored
//! record, [`row`] applies one row, and [`import`] drives a whole file.

pub mod changes;
pub mod export;
pub mod import;
pub mod row;

pub use changes::{ChangeDetector, IncomingRow};
pub use export::{ExportOptions, ExportResult, ExportService};
pub use import::{ImportOptions, ImportResult, ImportService, ProgressCallback, RowError, RowPreview};
pub use row::{RowFailure, RowImporter, RowOutcome, RowReport};
