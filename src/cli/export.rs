//! Export CLI command.

use crate::Result;
use crate::config::QuarryConfig;
use crate::io::{ExportOptions, ExportService};
use crate::storage::RecordStore;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments of `quarry export`.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Output CSV file.
    pub file: PathBuf,

    /// Record type to export.
    #[arg(long = "type", value_name = "TYPE", default_value = "post")]
    pub record_type: String,

    /// Status to include (repeatable; all statuses when omitted).
    #[arg(long = "status", value_name = "STATUS")]
    pub statuses: Vec<String>,

    /// Meta key to include as a column (repeatable).
    #[arg(long = "meta", value_name = "KEY")]
    pub meta_keys: Vec<String>,

    /// Maximum number of records.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl ExportArgs {
    /// Builds export options using the configured column prefixes.
    #[must_use]
    pub fn to_options(&self, config: &QuarryConfig) -> ExportOptions {
        let mut options = ExportOptions::for_type(&self.record_type)
            .with_statuses(self.statuses.clone())
            .with_meta_keys(self.meta_keys.clone());
        options.prefixes = config.columns.clone();
        if let Some(limit) = self.limit {
            options = options.with_limit(limit);
        }
        options
    }
}

/// Runs `quarry export`.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the file cannot be written.
pub fn run_export(
    args: &ExportArgs,
    config: &QuarryConfig,
    store: Arc<dyn RecordStore>,
) -> Result<()> {
    let result = ExportService::new(store).export_to_file(&args.file, &args.to_options(config))?;
    println!(
        "Exported {} {} record(s) with {} columns to {}",
        result.exported,
        args.record_type,
        result.columns,
        args.file.display()
    );
    Ok(())
}
