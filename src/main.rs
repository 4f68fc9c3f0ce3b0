//! Binary entry point for quarry.
//!
//! This binary provides the CLI for importing and exporting site content as CSV.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use quarry::cli::{
    ConfigArgs, ExportArgs, ImportArgs, InspectArgs, open_store, run_config, run_export,
    run_import, run_inspect,
};
use quarry::config::{CONFIG_PATH_ENV, QuarryConfig};
use quarry::observability::{self, LoggingConfig};
use std::path::Path;
use std::process::ExitCode;

/// Quarry - spreadsheet round-tripping for site content.
#[derive(Parser)]
#[command(name = "quarry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to the record database (overrides configuration).
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Import a CSV file.
    Import(ImportArgs),

    /// Export records to a CSV file.
    Export(ExportArgs),

    /// Show how a CSV header resolves.
    Inspect(InspectArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    config = config.with_env_overrides(|key| std::env::var(key).ok());
    if let Some(store) = &cli.store {
        config = config.with_store_path(store);
    }

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &QuarryConfig) -> quarry::Result<ExitCode> {
    match command {
        Commands::Import(args) => run_import(&args, config, open_store(config)?),
        Commands::Export(args) => {
            run_export(&args, config, open_store(config)?)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Inspect(args) => run_inspect(&args, config),
        Commands::Config(args) => {
            run_config(args, config);
            Ok(ExitCode::SUCCESS)
        },
    }
}

/// Loads configuration from an explicit path, `QUARRY_CONFIG_PATH`, or the
/// default location.
fn load_config(path: Option<&str>) -> quarry::Result<QuarryConfig> {
    if let Some(config_path) = path {
        return QuarryConfig::load_from_file(Path::new(config_path));
    }

    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV)
        && !config_path.trim().is_empty()
    {
        return QuarryConfig::load_from_file(Path::new(&config_path));
    }

    Ok(QuarryConfig::load_default())
}
