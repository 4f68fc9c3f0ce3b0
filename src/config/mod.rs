//! Configuration management.
//!
//! Settings come from a TOML file, then `QUARRY_*` environment variables,
//! then command-line flags, each layer overriding the previous one.
//!
//! ```toml
//! store_path = "/srv/site/quarry.db"
//! log_dir = "/srv/site/import-logs"
//! media_max_bytes = 10485760
//! record_types = ["post", "page", "product"]
//!
//! [import]
//! default_status = "publish"
//! batch_size = 50
//! checked_fields = ["post_title", "post_content", "post_status"]
//!
//! [taxonomies]
//! category = ["post"]
//! product_cat = ["product"]
//!
//! [columns]
//! custom = "field_"
//!
//! [fields]
//! gallery = "list"
//! related = "relationship"
//!
//! [logging]
//! format = "json"
//! ```

use crate::io::{ColumnPrefixes, ImportOptions};
use crate::models::{CoreField, FieldKind};
use crate::storage::sqlite::media::DEFAULT_MAX_MEDIA_BYTES;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "QUARRY_CONFIG_PATH";

/// Main configuration for quarry.
#[derive(Debug, Clone)]
pub struct QuarryConfig {
    /// Database path; `None` uses the platform data directory.
    pub store_path: Option<PathBuf>,
    /// Directory receiving one run log per import.
    pub log_dir: PathBuf,
    /// Directory receiving sideloaded media files.
    pub media_dir: Option<PathBuf>,
    /// Timeout for media downloads, in seconds.
    pub media_timeout_secs: u64,
    /// Largest accepted media download, in bytes.
    pub media_max_bytes: u64,
    /// Record types registered in the store.
    pub record_types: Vec<String>,
    /// Taxonomies registered in the store, with the types they apply to.
    pub taxonomies: BTreeMap<String, Vec<String>>,
    /// Import defaults.
    pub import: ImportSettings,
    /// Column prefixes.
    pub columns: ColumnPrefixes,
    /// Declared custom field kinds.
    pub fields: BTreeMap<String, FieldKind>,
    /// Diagnostic logging.
    pub logging: LoggingSettings,
}

/// Import defaults, before command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Update records whose ID resolves.
    pub update_existing: bool,
    /// Create missing taxonomy terms.
    pub create_taxonomies: bool,
    /// Continue after a failed row.
    pub skip_on_error: bool,
    /// Rows per chunk.
    pub batch_size: usize,
    /// Record type override.
    pub default_type: Option<String>,
    /// Status of created records.
    pub default_status: String,
    /// Author of created records.
    pub default_author: Option<u64>,
    /// Errors shown in summaries.
    pub error_preview_limit: usize,
    /// Core fields compared on update.
    pub checked_fields: Vec<CoreField>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        let defaults = ImportOptions::default();
        Self {
            update_existing: defaults.update_existing,
            create_taxonomies: defaults.create_taxonomies,
            skip_on_error: defaults.skip_on_error,
            batch_size: defaults.batch_size,
            default_type: defaults.default_type,
            default_status: defaults.default_status,
            default_author: defaults.default_author,
            error_preview_limit: defaults.error_preview_limit,
            checked_fields: defaults.checked_fields,
        }
    }
}

/// Diagnostic logging settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
    /// Filter directive such as `quarry=debug`.
    pub filter: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub store_path: Option<String>,
    /// Run log directory.
    pub log_dir: Option<String>,
    /// Media directory.
    pub media_dir: Option<String>,
    /// Media download timeout.
    pub media_timeout_secs: Option<u64>,
    /// Media download size limit.
    pub media_max_bytes: Option<u64>,
    /// Record types.
    pub record_types: Option<Vec<String>>,
    /// Taxonomies section.
    pub taxonomies: Option<BTreeMap<String, Vec<String>>>,
    /// Import section.
    pub import: Option<ConfigFileImport>,
    /// Column prefixes section.
    pub columns: Option<ColumnPrefixes>,
    /// Field kinds section, by kind name.
    pub fields: Option<BTreeMap<String, String>>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Import section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileImport {
    /// Update existing records.
    pub update_existing: Option<bool>,
    /// Create missing terms.
    pub create_taxonomies: Option<bool>,
    /// Continue after failures.
    pub skip_on_error: Option<bool>,
    /// Chunk size.
    pub batch_size: Option<usize>,
    /// Record type override.
    pub default_type: Option<String>,
    /// Default status.
    pub default_status: Option<String>,
    /// Default author.
    pub default_author: Option<u64>,
    /// Error preview limit.
    pub error_preview_limit: Option<usize>,
    /// Checked core fields, by column name.
    pub checked_fields: Option<Vec<String>>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Output format.
    pub format: Option<String>,
    /// Log file.
    pub file: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            log_dir: PathBuf::from("quarry-logs"),
            media_dir: None,
            media_timeout_secs: 30,
            media_max_bytes: DEFAULT_MAX_MEDIA_BYTES,
            record_types: vec!["post".to_string(), "page".to_string()],
            taxonomies: [("category", "post"), ("post_tag", "post")]
                .into_iter()
                .map(|(taxonomy, record_type)| (taxonomy.to_string(), vec![record_type.to_string()]))
                .collect(),
            import: ImportSettings::default(),
            columns: ColumnPrefixes::default(),
            fields: BTreeMap::new(),
            logging: LoggingSettings::default(),
        }
    }
}

impl QuarryConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unknown field kind or core field.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or names an unknown
    /// field kind or core field.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Reads `config.toml` under the platform config dir
    /// (`~/.config/quarry/` on Linux). A file that exists but fails to load
    /// is reported and skipped.
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded configuration");
                config
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring config file: {e}");
                Self::default()
            },
        }
    }

    /// Platform config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("quarry").join("config.toml"))
    }

    /// Applies `QUARRY_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("QUARRY_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("QUARRY_LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
        if let Some(v) = get("QUARRY_MEDIA_DIR") {
            self.media_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("QUARRY_DEFAULT_TYPE") {
            self.import.default_type = Some(v.trim().to_string());
        }
        if let Some(v) = get("QUARRY_DEFAULT_STATUS") {
            self.import.default_status = v.trim().to_string();
        }
        if let Some(v) = get("QUARRY_DEFAULT_AUTHOR") {
            match v.trim().parse() {
                Ok(id) => self.import.default_author = Some(id),
                Err(_) => tracing::warn!("Ignoring QUARRY_DEFAULT_AUTHOR={v}: not an ID"),
            }
        }
        if let Some(v) = get("QUARRY_BATCH_SIZE") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.import.batch_size = n,
                _ => tracing::warn!("Ignoring QUARRY_BATCH_SIZE={v}: not a positive number"),
            }
        }
        self
    }

    /// Builds import options from the configured defaults.
    #[must_use]
    pub fn import_options(&self) -> ImportOptions {
        let settings = &self.import;
        ImportOptions {
            update_existing: settings.update_existing,
            create_taxonomies: settings.create_taxonomies,
            skip_on_error: settings.skip_on_error,
            batch_size: settings.batch_size,
            default_type: settings.default_type.clone(),
            default_status: settings.default_status.clone(),
            default_author: settings.default_author,
            checked_fields: settings.checked_fields.clone(),
            prefixes: self.columns.clone(),
            field_kinds: self.fields.clone(),
            error_preview_limit: settings.error_preview_limit,
            ..ImportOptions::default()
        }
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Sets the run log directory.
    #[must_use]
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = path.into();
        self
    }

    /// Converts a `ConfigFile` to `QuarryConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self {
            store_path: file.store_path.map(PathBuf::from),
            media_dir: file.media_dir.map(PathBuf::from),
            ..Self::default()
        };

        if let Some(log_dir) = file.log_dir {
            config.log_dir = PathBuf::from(log_dir);
        }
        if let Some(timeout) = file.media_timeout_secs {
            config.media_timeout_secs = timeout;
        }
        if let Some(max_bytes) = file.media_max_bytes {
            if max_bytes == 0 {
                return Err(Error::InvalidInput(
                    "media_max_bytes must be greater than 0".to_string(),
                ));
            }
            config.media_max_bytes = max_bytes;
        }
        if let Some(types) = file.record_types {
            config.record_types = types;
        }
        if let Some(taxonomies) = file.taxonomies {
            config.taxonomies = taxonomies;
        }
        if let Some(import) = file.import {
            apply_import_section(&mut config.import, import)?;
        }
        if let Some(columns) = file.columns {
            config.columns = columns;
        }
        if let Some(fields) = file.fields {
            for (name, kind) in fields {
                let parsed = FieldKind::parse(&kind).ok_or_else(|| {
                    Error::InvalidInput(format!("unknown kind \"{kind}\" for field {name}"))
                })?;
                config.fields.insert(name, parsed);
            }
        }
        if let Some(logging) = file.logging {
            config.logging = LoggingSettings {
                format: logging.format,
                file: logging.file.map(PathBuf::from),
                filter: logging.filter,
            };
        }

        Ok(config)
    }
}

fn apply_import_section(settings: &mut ImportSettings, import: ConfigFileImport) -> Result<()> {
    if let Some(v) = import.update_existing {
        settings.update_existing = v;
    }
    if let Some(v) = import.create_taxonomies {
        settings.create_taxonomies = v;
    }
    if let Some(v) = import.skip_on_error {
        settings.skip_on_error = v;
    }
    if let Some(v) = import.batch_size {
        if v == 0 {
            return Err(Error::InvalidInput("batch_size must be positive".to_string()));
        }
        settings.batch_size = v;
    }
    if import.default_type.is_some() {
        settings.default_type = import.default_type;
    }
    if let Some(v) = import.default_status {
        settings.default_status = v;
    }
    if import.default_author.is_some() {
        settings.default_author = import.default_author;
    }
    if let Some(v) = import.error_preview_limit {
        settings.error_preview_limit = v;
    }
    if let Some(names) = import.checked_fields {
        settings.checked_fields = names
            .iter()
            .map(|name| {
                CoreField::parse(name)
                    .ok_or_else(|| Error::InvalidInput(format!("unknown core field \"{name}\"")))
            })
            .collect::<Result<_>>()?;
    }
    Ok(())
}
