//! Connection handling for the `SQLite` record store.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection mutex, recovering from poison.
///
/// A panic inside a previous critical section leaves the connection usable,
/// so the guard is recovered and a warning is logged instead of failing
/// every later row of an import.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for a single-writer import workload.
///
/// - **WAL mode**: readers (exports, inspections) do not block the importer
/// - **NORMAL synchronous**: durable at transaction boundaries
/// - **`busy_timeout`**: waits up to 5 seconds when another run holds the lock
/// - **`foreign_keys`**: association rows follow their record
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if enabling foreign keys fails.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so pragma_update results are ignored here
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::OperationFailed {
            operation: "configure_connection".to_string(),
            cause: e.to_string(),
        })
}

/// Runs `f` inside `BEGIN IMMEDIATE` / `COMMIT`, rolling back on error.
///
/// # Errors
///
/// Returns the closure's error, or [`Error::OperationFailed`] when the
/// transaction cannot be opened or committed.
pub fn with_transaction<T>(conn: &Connection, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute("BEGIN IMMEDIATE", [])
        .map_err(|e| Error::OperationFailed {
            operation: "begin_transaction".to_string(),
            cause: e.to_string(),
        })?;

    let result = f();

    if result.is_ok() {
        conn.execute("COMMIT", []).map_err(|e| Error::OperationFailed {
            operation: "commit_transaction".to_string(),
            cause: e.to_string(),
        })?;
    } else {
        let _ = conn.execute("ROLLBACK", []);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    *acquire_lock(&mutex) += 1;
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*acquire_lock(&mutex), 10);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        conn.execute("CREATE TABLE t (v INTEGER)", []).unwrap();

        let result: Result<()> = with_transaction(&conn, || {
            conn.execute("INSERT INTO t (v) VALUES (1)", []).unwrap();
            Err(Error::Rejected("no".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
