//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Environment variable holding the preferred filter directive.
pub const LOG_FILTER_ENV: &str = "QUARRY_LOG";

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "warn";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, falling back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: None,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Builds logging config from file settings and the process environment.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::from_settings_with_env(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Builds logging config, reading environment variables through `lookup`.
    ///
    /// `QUARRY_LOG` wins over `RUST_LOG`, which wins over the file's filter.
    /// Verbose mode adds `quarry=debug` on top of whichever applies.
    #[must_use]
    pub fn from_settings_with_env(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let base = [LOG_FILTER_ENV, "RUST_LOG"]
            .iter()
            .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
            .or_else(|| settings.filter.clone())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let filter = if verbose {
            format!("{base},quarry=debug")
        } else {
            base
        };

        Self {
            format: settings
                .format
                .as_deref()
                .map(LogFormat::parse)
                .unwrap_or_default(),
            file: settings.file.clone(),
            filter,
        }
    }
}
