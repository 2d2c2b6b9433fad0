//! Connection handling for the `SQLite` store.

use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode, ffi};
use std::sync::{Mutex, MutexGuard};

/// Milliseconds a connection waits on a locked database before giving up.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

/// Acquires the connection mutex, recovering from poison.
///
/// A panic inside a critical section leaves the connection usable because
/// every write runs in a transaction that is rolled back on drop.
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

/// Applies WAL journaling, NORMAL sync and the busy timeout.
///
/// Several stores may share one database file; the busy timeout makes a
/// second writer queue behind `BEGIN IMMEDIATE` instead of failing at once.
///
/// # Errors
///
/// Returns [`Error::ConnectionFailed`] if the busy timeout cannot be set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row; in-memory databases report "memory"
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::ConnectionFailed {
            operation: "sqlite_configure".to_string(),
            cause: e.to_string(),
        })
}

/// Returns true if the error is a rejection by a UNIQUE constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Maps a `rusqlite` error to the crate error for a non-committing step.
///
/// Lock contention and unopenable files mean nothing was written and the
/// call may be retried.
pub fn classify_error(operation: &str, err: &rusqlite::Error) -> Error {
    let unreachable = matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
            )
    );
    if unreachable {
        Error::ConnectionFailed {
            operation: operation.to_string(),
            cause: err.to_string(),
        }
    } else {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: err.to_string(),
        }
    }
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
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 1);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let synchronous: i32 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1);

        let busy_timeout: u32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_unique_violation_detection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE, v TEXT NOT NULL)")
            .unwrap();
        conn.execute("INSERT INTO t (k, v) VALUES ('a', 'x')", [])
            .unwrap();

        let dup = conn
            .execute("INSERT INTO t (k, v) VALUES ('a', 'y')", [])
            .unwrap_err();
        assert!(is_unique_violation(&dup));

        let not_null = conn
            .execute("INSERT INTO t (k, v) VALUES ('b', NULL)", [])
            .unwrap_err();
        assert!(!is_unique_violation(&not_null));
    }

    #[test]
    fn test_classify_error_busy_is_connection_failure() {
        let err = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let mapped = classify_error("sqlite_insert", &err);
        assert!(mapped.is_retryable());
    }

    #[test]
    fn test_classify_error_other_is_operation_failure() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing", []).unwrap_err();
        assert!(matches!(
            classify_error("sqlite_find", &err),
            Error::OperationFailed { ref operation, .. } if operation == "sqlite_find"
        ));
    }
}
