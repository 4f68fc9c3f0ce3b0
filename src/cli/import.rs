//! Import CLI command.

use crate::Result;
use crate::config::QuarryConfig;
use crate::io::{ImportOptions, ImportResult, ImportService, ProgressCallback, RunContext};
use crate::io::columns::parse_mapping_pair;
use crate::storage::RecordStore;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Arguments of `quarry import`.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// CSV file to import.
    pub file: PathBuf,

    /// Detect and report changes without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Create a new record for every row, even when its ID exists.
    #[arg(long)]
    pub no_update: bool,

    /// Leave taxonomy terms that do not exist yet unassigned.
    #[arg(long)]
    pub no_create_terms: bool,

    /// Stop at the first failed row.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Record type applied to every row.
    #[arg(long = "type", value_name = "TYPE")]
    pub default_type: Option<String>,

    /// Status of created records whose row has none.
    #[arg(long = "status", value_name = "STATUS")]
    pub default_status: Option<String>,

    /// Author of created records whose row has none.
    #[arg(long = "author", value_name = "ID")]
    pub default_author: Option<u64>,

    /// Rows per progress report.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Rename a column before import (repeatable).
    #[arg(long = "map", value_name = "FROM=TO", value_parser = parse_mapping)]
    pub mappings: Vec<(String, String)>,

    /// Directory for the run log (overrides the configured one).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    /// Layers the flags over the configured import defaults.
    #[must_use]
    pub fn to_options(&self, config: &QuarryConfig) -> ImportOptions {
        let mut options = config.import_options().with_dry_run(self.dry_run);
        if self.no_update {
            options.update_existing = false;
        }
        if self.no_create_terms {
            options.create_taxonomies = false;
        }
        if self.stop_on_error {
            options.skip_on_error = false;
        }
        if let Some(record_type) = &self.default_type {
            options.default_type = Some(record_type.clone());
        }
        if let Some(status) = &self.default_status {
            options.default_status.clone_from(status);
        }
        if self.default_author.is_some() {
            options.default_author = self.default_author;
        }
        if let Some(size) = self.batch_size.filter(|n| *n > 0) {
            options.batch_size = size;
        }
        for (from, to) in &self.mappings {
            options = options.with_mapping(from.clone(), to.clone());
        }
        options
    }
}

/// Parses a `FROM=TO` column mapping.
///
/// # Errors
///
/// Returns a message when the value has no `=` or an empty side.
pub fn parse_mapping(s: &str) -> std::result::Result<(String, String), String> {
    parse_mapping_pair(s).ok_or_else(|| format!("expected FROM=TO, got \"{s}\""))
}

/// Runs `quarry import`.
///
/// Exits with failure when any row failed or the run halted.
///
/// # Errors
///
/// Returns an error if the file cannot be read, its header is invalid or the
/// run log cannot be created.
pub fn run_import(
    args: &ImportArgs,
    config: &QuarryConfig,
    store: Arc<dyn RecordStore>,
) -> Result<ExitCode> {
    let options = args.to_options(config);
    let log_dir = args.log_dir.as_ref().unwrap_or(&config.log_dir);
    let mut context = RunContext::new(log_dir)?;
    let service = ImportService::new(store);

    let progress: Option<ProgressCallback> = if args.json {
        None
    } else {
        Some(Box::new(|percent: f32, result: &ImportResult| {
            eprintln!("  {percent:.0}% ({} of {} rows)", result.processed(), result.total_rows);
        }))
    };

    let result = service.import_file(&args.file, &options, &mut context, progress)?;

    if args.json {
        let json = serde_json::to_string_pretty(&result).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_result".to_string(),
            cause: e.to_string(),
        })?;
        println!("{json}");
    } else {
        print_summary(&result, options.error_preview_limit);
    }

    Ok(if result.has_errors() || result.halted {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_summary(result: &ImportResult, error_limit: usize) {
    if result.dry_run {
        println!("Dry run: nothing was written");
        println!();
        for preview in &result.previews {
            println!("Row {}: {} \"{}\"", preview.row, preview.outcome, preview.title);
            for change in &preview.changes {
                println!("    {}: {} -> {}", change.label, change.old, change.new);
            }
        }
        if !result.previews.is_empty() {
            println!();
        }
    }

    println!("Import Summary");
    println!("==============");
    println!("Created:  {}", result.created);
    println!("Updated:  {}", result.updated);
    println!("Skipped:  {}", result.skipped);
    println!("Failed:   {}", result.failed);
    if result.dropped_rows > 0 {
        println!("Dropped:  {} (column count mismatch)", result.dropped_rows);
    }
    if result.halted {
        println!("Stopped at the first failed row");
    }

    if result.has_errors() {
        println!();
        println!("Errors:");
        for error in result.error_preview(error_limit) {
            println!("  Row {} ({}): {}", error.row, error.title, error.message);
        }
        let hidden = result.errors.len().saturating_sub(error_limit);
        if hidden > 0 {
            println!("  ... and {hidden} more");
        }
    }

    if let Some(log_file) = &result.log_file {
        println!();
        println!("Run log: {log_file}");
    }
}
