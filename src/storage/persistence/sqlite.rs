//! `SQLite` fingerprint store.
//!
//! The uniqueness of `(fingerprint, algorithm)` is a table constraint. Inserts
//! run inside `BEGIN IMMEDIATE`, so any number of stores (in this process or
//! others) can share one database file: writers queue on the database lock
//! and a losing writer reads the winner inside its own transaction.

use crate::models::{FingerprintId, FingerprintRecord, HashAlgorithm, InsertOutcome, NewFingerprint};
use crate::storage::metrics::{observe, record_operation_metrics};
use crate::storage::sqlite::{
    FingerprintRow, RECORD_COLUMNS, acquire_lock, classify_error, configure_connection,
    is_unique_violation,
};
use crate::storage::traits::{FingerprintStore, validate_candidate, validate_table_name};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Default table name.
pub const DEFAULT_TABLE: &str = "fingerprints";

/// `SQLite`-backed [`FingerprintStore`].
///
/// # Concurrency Model
///
/// One `Mutex<Connection>` per store serialises callers within the store.
/// Across stores the database lock does the work: WAL mode lets readers
/// proceed during a write and `busy_timeout` makes writers wait their turn.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE fingerprints (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     source_name TEXT NOT NULL,
///     source_path TEXT NOT NULL,
///     fingerprint TEXT NOT NULL,
///     size_bytes INTEGER NOT NULL,
///     algorithm TEXT NOT NULL,
///     content_only INTEGER NOT NULL,
///     created_at INTEGER NOT NULL DEFAULT (unixepoch),
///     UNIQUE (fingerprint, algorithm)
/// );
/// ```
pub struct SqliteFingerprintStore {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// None for in-memory.
    db_path: Option<PathBuf>,
    table: String,
}

impl SqliteFingerprintStore {
    /// Opens (or creates) a store at `db_path` using the default table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if the file cannot be opened and
    /// [`Error::SchemaBootstrapFailed`] if the schema cannot be created.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_table(db_path, DEFAULT_TABLE)
    }

    /// Opens (or creates) a store at `db_path` using `table`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an invalid table name, otherwise as [`Self::new`].
    pub fn with_table(db_path: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self> {
        let db_path = db_path.into();
        let table = table.into();
        validate_table_name(&table)?;
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::ConnectionFailed {
                operation: "sqlite_create_dir".to_string(),
                cause: e.to_string(),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::ConnectionFailed {
            operation: "sqlite_open".to_string(),
            cause: e.to_string(),
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            table,
        };
        store.bootstrap()?;
        Ok(store)
    }

    /// Creates an in-memory store, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::ConnectionFailed {
            operation: "sqlite_open_in_memory".to_string(),
            cause: e.to_string(),
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
            table: DEFAULT_TABLE.to_string(),
        };
        store.bootstrap()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn schema_sql(&self) -> String {
        let table = &self.table;
        format!(
            "BEGIN IMMEDIATE;
             CREATE TABLE IF NOT EXISTS {table} (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 source_name TEXT NOT NULL,
                 source_path TEXT NOT NULL,
                 fingerprint TEXT NOT NULL,
                 size_bytes INTEGER NOT NULL,
                 algorithm TEXT NOT NULL,
                 content_only INTEGER NOT NULL,
                 created_at INTEGER NOT NULL DEFAULT (CAST(strftime('%s', 'now') AS INTEGER)),
                 UNIQUE (fingerprint, algorithm)
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_fingerprint ON {table} (fingerprint);
             CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at DESC);
             COMMIT;"
        )
    }

    fn fetch_by_key(
        conn: &Connection,
        table: &str,
        fingerprint: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Option<FingerprintRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {table}
             WHERE fingerprint = ?1 AND algorithm = ?2"
        );
        conn.query_row(&sql, params![fingerprint, algorithm.as_str()], FingerprintRow::from_row)
            .optional()
            .map_err(|e| classify_error("sqlite_exists", &e))?
            .map(FingerprintRow::into_record)
            .transpose()
    }

    fn insert_locked(
        conn: &mut Connection,
        table: &str,
        candidate: &NewFingerprint,
    ) -> Result<InsertOutcome> {
        let size_bytes = i64::try_from(candidate.size_bytes)
            .map_err(|_| Error::InvalidInput(format!("size {} too large", candidate.size_bytes)))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| classify_error("sqlite_begin_insert", &e))?;

        let sql = format!(
            "INSERT INTO {table}
                 (source_name, source_path, fingerprint, size_bytes, algorithm, content_only)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             RETURNING id, created_at"
        );
        let inserted = tx.query_row(
            &sql,
            params![
                candidate.source_name,
                candidate.source_path,
                candidate.fingerprint,
                size_bytes,
                candidate.algorithm.as_str(),
                candidate.content_only,
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        );

        match inserted {
            Ok((id, created_at)) => {
                tx.commit().map_err(|e| Error::AmbiguousWrite {
                    operation: "sqlite_commit_insert".to_string(),
                    cause: e.to_string(),
                })?;
                Ok(InsertOutcome::stored(FingerprintRecord {
                    id: FingerprintId::new(id),
                    source_name: candidate.source_name.clone(),
                    source_path: candidate.source_path.clone(),
                    fingerprint: candidate.fingerprint.clone(),
                    size_bytes: candidate.size_bytes,
                    algorithm: candidate.algorithm,
                    content_only: candidate.content_only,
                    created_at: u64::try_from(created_at).unwrap_or_default(),
                }))
            },
            Err(e) if is_unique_violation(&e) => {
                // Still holding the write lock, so the winner is visible and stable.
                let winner =
                    Self::fetch_by_key(&tx, table, &candidate.fingerprint, candidate.algorithm)?;
                drop(tx);
                winner
                    .map(InsertOutcome::duplicate)
                    .ok_or_else(|| Error::OperationFailed {
                        operation: "sqlite_insert".to_string(),
                        cause: "unique constraint rejected insert but no conflicting row found"
                            .to_string(),
                    })
            },
            Err(e) => Err(classify_error("sqlite_insert", &e)),
        }
    }
}

impl FingerprintStore for SqliteFingerprintStore {
    #[instrument(
        skip(self),
        fields(operation = "bootstrap", backend = "sqlite", table = %self.table)
    )]
    fn bootstrap(&self) -> Result<()> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = configure_connection(&conn).and_then(|()| {
            conn.execute_batch(&self.schema_sql())
                .map_err(|e| Error::SchemaBootstrapFailed {
                    cause: e.to_string(),
                })
        });
        if result.is_err() {
            let _ = conn.execute_batch("ROLLBACK");
        }
        drop(conn);
        observe(BACKEND, "bootstrap", start, result)
    }

    #[instrument(skip(self), fields(operation = "exists", backend = "sqlite"))]
    fn exists(
        &self,
        fingerprint: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Option<FingerprintRecord>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = Self::fetch_by_key(&conn, &self.table, fingerprint, algorithm);
        drop(conn);
        observe(BACKEND, "exists", start, result)
    }

    #[instrument(skip(self), fields(operation = "find", backend = "sqlite"))]
    fn find(&self, fingerprint: &str) -> Result<Vec<FingerprintRecord>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {} WHERE fingerprint = ?1 ORDER BY id",
            self.table
        );
        let result: Result<Vec<FingerprintRecord>> = conn
            .prepare(&sql)
            .and_then(|mut stmt| {
                let rows = stmt
                    .query_map(params![fingerprint], FingerprintRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .map_err(|e| classify_error("sqlite_find", &e))
            .and_then(|rows| rows.into_iter().map(FingerprintRow::into_record).collect());
        drop(conn);
        observe(BACKEND, "find", start, result)
    }

    #[instrument(skip(self), fields(operation = "get", backend = "sqlite", id = %id))]
    fn get(&self, id: FingerprintId) -> Result<Option<FingerprintRecord>> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let sql = format!("SELECT {RECORD_COLUMNS} FROM {} WHERE id = ?1", self.table);
        let result = conn
            .query_row(&sql, params![id.get()], FingerprintRow::from_row)
            .optional()
            .map_err(|e| classify_error("sqlite_get", &e))
            .and_then(|row| row.map(FingerprintRow::into_record).transpose());
        drop(conn);
        observe(BACKEND, "get", start, result)
    }

    #[instrument(
        skip(self, candidate),
        fields(
            operation = "insert",
            backend = "sqlite",
            algorithm = %candidate.algorithm,
            source = %candidate.source_name
        )
    )]
    fn insert(&self, candidate: &NewFingerprint) -> Result<InsertOutcome> {
        let start = Instant::now();
        validate_candidate(candidate)?;
        let mut conn = acquire_lock(&self.conn);
        let result = Self::insert_locked(&mut conn, &self.table, candidate);
        drop(conn);

        let status = match &result {
            Ok(outcome) if outcome.stored => "success",
            Ok(_) => "duplicate",
            Err(_) => "error",
        };
        record_operation_metrics(BACKEND, "insert", start, status);
        result
    }

    #[instrument(skip(self), fields(operation = "count", backend = "sqlite"))]
    fn count(&self) -> Result<usize> {
        let start = Instant::now();
        let conn = acquire_lock(&self.conn);
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let result = conn
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .map_err(|e| classify_error("sqlite_count", &e))
            .map(|n| usize::try_from(n).unwrap_or_default());
        drop(conn);
        observe(BACKEND, "count", start, result)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FingerprintEngine;
    use tempfile::TempDir;

    fn candidate(content: &[u8], name: &str, algorithm: HashAlgorithm) -> NewFingerprint {
        NewFingerprint {
            source_name: name.to_string(),
            source_path: format!("/docs/{name}"),
            fingerprint: FingerprintEngine::digest(content, algorithm),
            size_bytes: content.len() as u64,
            algorithm,
            content_only: true,
        }
    }

    #[test]
    fn test_insert_then_duplicate() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let first = store
            .insert(&candidate(b"Hello World", "a.pdf", HashAlgorithm::Blake2b512))
            .unwrap();
        assert!(first.stored);
        let stored = first.record.clone().unwrap();

        let second = store
            .insert(&candidate(b"Hello World", "b.pdf", HashAlgorithm::Blake2b512))
            .unwrap();
        assert!(!second.stored);
        let existing = second.conflicting_record.unwrap();
        assert_eq!(existing.id, stored.id);
        assert_eq!(existing.source_name, "a.pdf");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_same_digest_different_algorithm_both_stored() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let mut a = candidate(b"x", "a", HashAlgorithm::Sha256);
        let b = candidate(b"x", "b", HashAlgorithm::Sha3_256);
        assert!(store.insert(&a).unwrap().stored);
        assert!(store.insert(&b).unwrap().stored);

        // A forged record sharing b's digest under a different algorithm.
        a.fingerprint.clone_from(&b.fingerprint);
        assert!(store.insert(&a).unwrap().stored);
        assert_eq!(store.find(&b.fingerprint).unwrap().len(), 2);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_exists_and_get() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let c = candidate(b"doc", "doc.pdf", HashAlgorithm::Sha512);
        assert!(store.exists(&c.fingerprint, c.algorithm).unwrap().is_none());

        let outcome = store.insert(&c).unwrap();
        let id = outcome.record.unwrap().id;

        let found = store.exists(&c.fingerprint, c.algorithm).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.exists(&c.fingerprint, HashAlgorithm::Sha256).unwrap().is_none());

        let got = store.get(id).unwrap().unwrap();
        assert_eq!(got.fingerprint, c.fingerprint);
        assert!(got.created_at > 0);
        assert!(store.get(FingerprintId::new(9999)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_fingerprint_writes_nothing() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let mut c = candidate(b"doc", "doc.pdf", HashAlgorithm::Sha256);
        c.fingerprint = "not-hex".to_string();
        assert!(matches!(store.insert(&c), Err(Error::InvalidInput(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_ids_increase() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let a = store.insert(&candidate(b"1", "1", HashAlgorithm::Sha256)).unwrap();
        let b = store.insert(&candidate(b"2", "2", HashAlgorithm::Sha256)).unwrap();
        assert!(b.record.unwrap().id.get() > a.record.unwrap().id.get());
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        store.insert(&candidate(b"keep", "k", HashAlgorithm::Sha256)).unwrap();
        store.bootstrap().unwrap();
        store.bootstrap().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("fp.db");
        let c = candidate(b"persist", "p", HashAlgorithm::Blake2b512);
        {
            let store = SqliteFingerprintStore::new(&path).unwrap();
            assert!(store.insert(&c).unwrap().stored);
        }
        let reopened = SqliteFingerprintStore::new(&path).unwrap();
        assert_eq!(reopened.db_path(), Some(path.as_path()));
        assert!(!reopened.insert(&c).unwrap().stored);
    }

    #[test]
    fn test_custom_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fp.db");
        let store = SqliteFingerprintStore::with_table(&path, "resumes").unwrap();
        assert_eq!(store.table(), "resumes");
        store.insert(&candidate(b"r", "r", HashAlgorithm::Sha256)).unwrap();

        let other = SqliteFingerprintStore::new(&path).unwrap();
        assert_eq!(other.count().unwrap(), 0);
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let dir = TempDir::new().unwrap();
        let result = SqliteFingerprintStore::with_table(dir.path().join("x.db"), "a b");
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
