//! Inspect CLI command.

use crate::Result;
use crate::config::QuarryConfig;
use crate::io::{
    Column, ColumnSchema, HeaderValidator, ValidationResult, read_csv_file, suggest_field_mapping,
};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments of `quarry inspect`.
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// CSV file to inspect.
    pub file: PathBuf,

    /// Record type the import would apply to every row.
    #[arg(long = "type", value_name = "TYPE")]
    pub default_type: Option<String>,
}

/// Header report of a CSV file.
#[derive(Debug)]
pub struct InspectReport {
    /// Resolved columns in header order.
    pub schema: ColumnSchema,
    /// Header validation outcome.
    pub validation: ValidationResult,
    /// Suggested renames for unrecognized headers.
    pub suggestions: Vec<(String, String)>,
    /// Data rows read.
    pub rows: usize,
    /// Rows dropped for a column-count mismatch.
    pub dropped: usize,
}

/// Reads a CSV and resolves its header with the configured prefixes and
/// declared field kinds.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn inspect_file(args: &InspectArgs, config: &QuarryConfig) -> Result<InspectReport> {
    let table = read_csv_file(&args.file)?;
    let schema = ColumnSchema::resolve(&table.headers, &config.columns, |name| {
        config.fields.get(name).copied()
    });
    let has_default_type = args.default_type.is_some() || config.import.default_type.is_some();
    let validation = HeaderValidator::new()
        .with_default_type(has_default_type)
        .validate(&table.headers, &schema);
    let suggestions = suggest_field_mapping(&table.headers).into_iter().collect();

    Ok(InspectReport {
        schema,
        validation,
        suggestions,
        rows: table.rows.len(),
        dropped: table.dropped,
    })
}

/// Runs `quarry inspect`.
///
/// Exits with failure when the header would abort an import.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn run_inspect(args: &InspectArgs, config: &QuarryConfig) -> Result<ExitCode> {
    let report = inspect_file(args, config)?;

    println!("{}", args.file.display());
    println!("Rows: {} ({} dropped)", report.rows, report.dropped);
    println!();
    println!("Columns:");
    for (header, column) in report.schema.iter() {
        match column {
            Column::Ignored(_) => println!("  {header:<24} (ignored)"),
            other => println!("  {header:<24} {}", other.label()),
        }
    }

    if !report.validation.issues.is_empty() {
        println!();
        for issue in &report.validation.issues {
            println!("  {issue}");
        }
    }

    if !report.suggestions.is_empty() {
        println!();
        println!("Suggested mappings:");
        for (from, to) in &report.suggestions {
            println!("  --map \"{from}={to}\"");
        }
    }

    Ok(if report.validation.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
