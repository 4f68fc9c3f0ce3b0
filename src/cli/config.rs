//! Config CLI command.

use crate::config::QuarryConfig;
use crate::storage::default_store_path;
use clap::Args;

/// Arguments of `quarry config`.
#[derive(Debug, Clone, Copy, Args)]
pub struct ConfigArgs {
    /// Show the effective configuration.
    #[arg(long)]
    pub show: bool,

    /// Show where the configuration file is looked up.
    #[arg(long)]
    pub path: bool,
}

/// Runs `quarry config`.
pub fn run_config(args: ConfigArgs, config: &QuarryConfig) {
    if args.path {
        match QuarryConfig::default_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no config directory on this platform)"),
        }
        return;
    }
    if !args.show {
        println!("Use --show to display configuration");
        println!("Use --path to locate the configuration file");
        return;
    }

    let store_path = config.store_path.clone().unwrap_or_else(default_store_path);
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("Store: {}", store_path.display());
    println!("Run Log Directory: {}", config.log_dir.display());
    println!(
        "Media Directory: {}",
        config
            .media_dir
            .as_ref()
            .map_or_else(|| "(not kept on disk)".to_string(), |d| d.display().to_string())
    );
    println!("Media Size Limit: {} bytes", config.media_max_bytes);
    println!("Record Types: {}", config.record_types.join(", "));
    for (taxonomy, types) in &config.taxonomies {
        println!("  Taxonomy {taxonomy}: {}", types.join(", "));
    }
    println!();

    let import = &config.import;
    println!("Import Defaults:");
    println!("  Update Existing: {}", import.update_existing);
    println!("  Create Terms: {}", import.create_taxonomies);
    println!("  Skip On Error: {}", import.skip_on_error);
    println!("  Batch Size: {}", import.batch_size);
    println!(
        "  Default Type: {}",
        import.default_type.as_deref().unwrap_or("(from row)")
    );
    println!("  Default Status: {}", import.default_status);
    println!(
        "  Default Author: {}",
        import
            .default_author
            .map_or_else(|| "(none)".to_string(), |id| id.to_string())
    );
    let checked: Vec<&str> = import.checked_fields.iter().map(|f| f.column_name()).collect();
    println!("  Checked Fields: {}", checked.join(", "));
    println!();

    println!("Column Prefixes:");
    println!("  Taxonomy: {}", config.columns.taxonomy);
    println!("  Custom Field: {}", config.columns.custom);
    println!("  Meta: {}", config.columns.meta);
    if !config.fields.is_empty() {
        println!();
        println!("Declared Fields:");
        for (name, kind) in &config.fields {
            println!("  {name}: {}", kind.as_str());
        }
    }
}
