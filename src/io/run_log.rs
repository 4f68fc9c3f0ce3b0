//! Per-run context and the durable run log.
//!
//! Each import run writes one append-only log named after its start time.
//! Every line is flushed before the next row is attempted, so an aborted run
//! still leaves a record of everything processed.

use crate::{Error, Result};
use chrono::{DateTime, Local, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

enum Sink {
    File { file: File, path: PathBuf },
    Memory(Vec<String>),
}

/// Append-only, timestamped run log.
pub struct RunLog {
    sink: Sink,
}

impl RunLog {
    /// Creates a log file in `dir` named `import_<timestamp>.log`.
    ///
    /// A numeric suffix is added if a log with the same name exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the directory or file cannot be created.
    pub fn create(dir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: format!("{}: {e}", dir.display()),
        })?;

        let stem = format!("import_{}", started_at.format(FILE_TIMESTAMP_FORMAT));
        let mut attempt = 1;
        loop {
            let name = if attempt == 1 {
                format!("{stem}.log")
            } else {
                format!("{stem}_{attempt}.log")
            };
            let path = dir.join(name);
            match OpenOptions::new().append(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self {
                    sink: Sink::File { file, path },
                }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt += 1;
                },
                Err(e) => {
                    return Err(Error::OperationFailed {
                        operation: "create_run_log".to_string(),
                        cause: format!("{}: {e}", path.display()),
                    });
                },
            }
        }
    }

    /// Creates a log kept in memory.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
        }
    }

    /// Appends one `[timestamp] message` line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the line cannot be written.
    pub fn line(&mut self, message: &str) -> Result<()> {
        let line = format!(
            "[{}] {message}",
            Local::now().format(LINE_TIMESTAMP_FORMAT)
        );
        match &mut self.sink {
            Sink::File { file, .. } => writeln!(file, "{line}")
                .and_then(|()| file.flush())
                .map_err(|e| Error::OperationFailed {
                    operation: "write_run_log".to_string(),
                    cause: e.to_string(),
                }),
            Sink::Memory(lines) => {
                lines.push(line);
                Ok(())
            },
        }
    }

    /// Returns the log file path, if the log is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File { path, .. } => Some(path),
            Sink::Memory(_) => None,
        }
    }

    /// Returns the lines of an in-memory log.
    #[must_use]
    pub fn lines(&self) -> Option<&[String]> {
        match &self.sink {
            Sink::File { .. } => None,
            Sink::Memory(lines) => Some(lines),
        }
    }
}

/// State owned by a single import run.
pub struct RunContext {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    log: RunLog,
}

impl RunContext {
    /// Starts a run logging to a file in `log_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run log cannot be created.
    pub fn new(log_dir: &Path) -> Result<Self> {
        let now = Local::now();
        Ok(Self {
            run_id: Uuid::now_v7(),
            started_at: now.with_timezone(&Utc),
            log: RunLog::create(log_dir, now)?,
        })
    }

    /// Starts a run whose log stays in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            log: RunLog::in_memory(),
        }
    }

    /// Returns the run log.
    #[must_use]
    pub const fn log(&self) -> &RunLog {
        &self.log
    }

    /// Appends a line to the run log.
    ///
    /// Write failures are reported as warnings and never stop the run.
    pub fn record(&mut self, message: &str) {
        if let Err(e) = self.log.line(message) {
            tracing::warn!(run_id = %self.run_id, error = %e, "Failed to write run log line");
        }
    }

    /// Returns the base name of the log file, if file-backed.
    #[must_use]
    pub fn log_file(&self) -> Option<String> {
        self.log
            .path()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }
}
