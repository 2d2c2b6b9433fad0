//! PostgreSQL fingerprint store.
//!
//! Uniqueness of `(fingerprint, algorithm)` is a table constraint; an insert
//! that loses a race is rejected with `unique_violation`, which is reported
//! as a duplicate carrying the winning row.

#[cfg(feature = "postgres")]
mod implementation {
    use crate::models::{
        FingerprintId, FingerprintRecord, HashAlgorithm, InsertOutcome, NewFingerprint,
    };
    use crate::storage::metrics::{observe, record_operation_metrics};
    use crate::storage::migrations::{Migration, MigrationRunner, verify_version};
    use crate::storage::traits::{FingerprintStore, validate_candidate, validate_table_name};
    use crate::{Error, Result};
    use deadpool_postgres::{Config, Pool, Runtime};
    use std::time::{Duration, Instant};
    use tokio::runtime::{Handle, RuntimeFlavor};
    use tokio_postgres::error::SqlState;
    use tracing::instrument;

    const BACKEND: &str = "postgresql";

    /// Embedded migrations compiled into the binary.
    const MIGRATIONS: &[Migration] = &[
        Migration {
            version: 1,
            description: "Initial fingerprints table",
            sql: r"
                CREATE TABLE IF NOT EXISTS {table} (
                    id BIGSERIAL PRIMARY KEY,
                    source_name TEXT NOT NULL,
                    source_path TEXT NOT NULL,
                    fingerprint TEXT NOT NULL,
                    size_bytes BIGINT NOT NULL,
                    algorithm TEXT NOT NULL,
                    content_only BOOLEAN NOT NULL,
                    created_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
                    CONSTRAINT {table}_fingerprint_algorithm_key UNIQUE (fingerprint, algorithm)
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_fingerprint ON {table} (fingerprint);
            ",
        },
        Migration {
            version: 2,
            description: "Add created_at index",
            sql: r"
                CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at DESC);
            ",
        },
    ];

    const RECORD_COLUMNS: &str = "id, source_name, source_path, fingerprint, size_bytes, \
                                  algorithm, content_only, created_at";

    /// Default maximum connections in pool.
    pub const DEFAULT_POOL_MAX_SIZE: usize = 20;

    /// Pool acquire, connect and recycle timeout.
    const POOL_TIMEOUT: Duration = Duration::from_secs(5);

    /// The pool could not hand out a connection; nothing was sent.
    fn pool_error(e: impl std::fmt::Display) -> Error {
        Error::ConnectionFailed {
            operation: "postgres_get_client".to_string(),
            cause: e.to_string(),
        }
    }

    /// True if the connection itself failed: closed, or an I/O error underneath.
    fn is_transport_error(e: &tokio_postgres::Error) -> bool {
        e.is_closed()
            || std::error::Error::source(e)
                .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some())
    }

    /// Maps an error from a statement that cannot have written anything.
    ///
    /// Only transport failures are retryable. Server rejections, row-count
    /// mismatches and decode errors would fail the same way again.
    fn query_error(op: &str, e: &tokio_postgres::Error) -> Error {
        if is_transport_error(e) {
            Error::ConnectionFailed {
                operation: op.to_string(),
                cause: e.to_string(),
            }
        } else {
            Error::OperationFailed {
                operation: op.to_string(),
                cause: e.to_string(),
            }
        }
    }

    /// Maps an error from the insert statement itself.
    ///
    /// A server-reported error means the statement was rejected. Anything
    /// else (closed socket, I/O) may have happened after the server committed.
    fn insert_error(e: &tokio_postgres::Error) -> Error {
        if e.as_db_error().is_some() {
            Error::OperationFailed {
                operation: "postgres_insert".to_string(),
                cause: e.to_string(),
            }
        } else {
            Error::AmbiguousWrite {
                operation: "postgres_insert".to_string(),
                cause: e.to_string(),
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn row_to_record(row: &tokio_postgres::Row) -> Result<FingerprintRecord> {
        let algorithm: String = row.get("algorithm");
        let algorithm = HashAlgorithm::parse(&algorithm).map_err(|e| Error::OperationFailed {
            operation: "postgres_decode_row".to_string(),
            cause: e.to_string(),
        })?;
        let size_bytes: i64 = row.get("size_bytes");
        let created_at: i64 = row.get("created_at");
        Ok(FingerprintRecord {
            id: FingerprintId::new(row.get("id")),
            source_name: row.get("source_name"),
            source_path: row.get("source_path"),
            fingerprint: row.get("fingerprint"),
            size_bytes: size_bytes.max(0) as u64,
            algorithm,
            content_only: row.get("content_only"),
            created_at: created_at.max(0) as u64,
        })
    }

    /// PostgreSQL-backed [`FingerprintStore`].
    ///
    /// Owns a small Tokio runtime that drives the connection pool for the
    /// blocking trait methods. Async callers should use the `*_async`
    /// methods directly.
    pub struct PostgresFingerprintStore {
        pool: Pool,
        table_name: String,
        runtime: tokio::runtime::Runtime,
    }

    impl PostgresFingerprintStore {
        /// Connects with default pool settings and applies migrations.
        ///
        /// TLS is used when the URL carries `sslmode=require`.
        ///
        /// # Errors
        ///
        /// Returns [`Error::ConnectionFailed`] if the database is unreachable
        /// and [`Error::SchemaBootstrapFailed`] if migrations fail.
        pub fn new(connection_url: &str, table_name: impl Into<String>) -> Result<Self> {
            Self::with_options(connection_url, table_name, None, false)
        }

        /// Connects with an explicit pool size and TLS requirement.
        ///
        /// # Errors
        ///
        /// As [`Self::new`]; also [`Error::InvalidInput`] for a malformed URL
        /// or table name, and [`Error::FeatureNotEnabled`] if TLS is required
        /// but the `postgres-tls` feature is off.
        pub fn with_options(
            connection_url: &str,
            table_name: impl Into<String>,
            pool_max_size: Option<usize>,
            require_tls: bool,
        ) -> Result<Self> {
            let table_name = table_name.into();
            validate_table_name(&table_name)?;
            let config = Self::parse_connection_url(connection_url)?;
            let use_tls = require_tls
                || matches!(config.get_ssl_mode(), tokio_postgres::config::SslMode::Require);
            let cfg = Self::build_pool_config(&config, pool_max_size);
            let pool = Self::create_pool(&cfg, use_tls)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("docprint-postgres")
                .enable_all()
                .build()
                .map_err(|e| Error::OperationFailed {
                    operation: "postgres_create_runtime".to_string(),
                    cause: e.to_string(),
                })?;

            let store = Self {
                pool,
                table_name,
                runtime,
            };
            store.bootstrap()?;
            Ok(store)
        }

        /// Returns the table name.
        #[must_use]
        pub fn table_name(&self) -> &str {
            &self.table_name
        }

        fn parse_connection_url(url: &str) -> Result<tokio_postgres::Config> {
            url.parse::<tokio_postgres::Config>()
                .map_err(|e| Error::InvalidInput(format!("invalid PostgreSQL URL: {e}")))
        }

        #[cfg(unix)]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            match h {
                tokio_postgres::config::Host::Tcp(s) => s.clone(),
                tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
            }
        }

        #[cfg(not(unix))]
        fn host_to_string(h: &tokio_postgres::config::Host) -> String {
            let tokio_postgres::config::Host::Tcp(s) = h;
            s.clone()
        }

        fn build_pool_config(
            config: &tokio_postgres::Config,
            pool_max_size: Option<usize>,
        ) -> Config {
            let mut cfg = Config::new();
            cfg.host = config.get_hosts().first().map(Self::host_to_string);
            cfg.port = config.get_ports().first().copied();
            cfg.user = config.get_user().map(String::from);
            cfg.password = config
                .get_password()
                .map(|p| String::from_utf8_lossy(p).to_string());
            cfg.dbname = config.get_dbname().map(String::from);
            cfg.connect_timeout = Some(POOL_TIMEOUT);

            cfg.pool = Some(deadpool_postgres::PoolConfig {
                max_size: pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
                timeouts: deadpool_postgres::Timeouts {
                    wait: Some(POOL_TIMEOUT),
                    create: Some(POOL_TIMEOUT),
                    recycle: Some(POOL_TIMEOUT),
                },
                ..Default::default()
            });
            cfg.manager = Some(deadpool_postgres::ManagerConfig {
                recycling_method: deadpool_postgres::RecyclingMethod::Fast,
            });
            cfg
        }

        fn create_pool(cfg: &Config, use_tls: bool) -> Result<Pool> {
            let map = |e: deadpool_postgres::CreatePoolError| Error::ConnectionFailed {
                operation: "postgres_create_pool".to_string(),
                cause: e.to_string(),
            };
            if use_tls {
                cfg.create_pool(Some(Runtime::Tokio1), tls::connector()?)
                    .map_err(map)
            } else {
                cfg.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)
                    .map_err(map)
            }
        }

        /// Runs a future to completion on the store's runtime.
        fn block_on<F, T>(&self, f: F) -> Result<T>
        where
            F: std::future::Future<Output = Result<T>>,
        {
            match Handle::try_current() {
                Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                    tokio::task::block_in_place(|| self.runtime.block_on(f))
                },
                Ok(_) => Err(Error::OperationFailed {
                    operation: "postgres_block_on".to_string(),
                    cause: "blocking call from a current-thread runtime; use the async methods"
                        .to_string(),
                }),
                Err(_) => self.runtime.block_on(f),
            }
        }

        /// Applies pending migrations and confirms the recorded schema version.
        ///
        /// # Errors
        ///
        /// See [`MigrationRunner::run`]; also [`Error::SchemaBootstrapFailed`]
        /// if the table is still behind afterwards.
        pub async fn bootstrap_async(&self) -> Result<()> {
            let runner = MigrationRunner::new(self.pool.clone(), &self.table_name);
            runner.run(MIGRATIONS).await?;
            let recorded = runner.current_version().await?;
            verify_version(runner.table_name(), recorded, MIGRATIONS)?;
            Ok(())
        }

        /// Looks up the record holding `(fingerprint, algorithm)`.
        ///
        /// # Errors
        ///
        /// Returns an error if the query fails.
        pub async fn exists_async(
            &self,
            fingerprint: &str,
            algorithm: HashAlgorithm,
        ) -> Result<Option<FingerprintRecord>> {
            let client = self.pool.get().await.map_err(pool_error)?;
            let query = format!(
                "SELECT {RECORD_COLUMNS} FROM {} WHERE fingerprint = $1 AND algorithm = $2",
                self.table_name
            );
            client
                .query_opt(&query, &[&fingerprint, &algorithm.as_str()])
                .await
                .map_err(|e| query_error("postgres_exists", &e))?
                .as_ref()
                .map(row_to_record)
                .transpose()
        }

        /// Returns every record with this fingerprint.
        ///
        /// # Errors
        ///
        /// Returns an error if the query fails.
        pub async fn find_async(&self, fingerprint: &str) -> Result<Vec<FingerprintRecord>> {
            let client = self.pool.get().await.map_err(pool_error)?;
            let query = format!(
                "SELECT {RECORD_COLUMNS} FROM {} WHERE fingerprint = $1 ORDER BY id",
                self.table_name
            );
            client
                .query(&query, &[&fingerprint])
                .await
                .map_err(|e| query_error("postgres_find", &e))?
                .iter()
                .map(row_to_record)
                .collect()
        }

        /// Retrieves a record by identifier.
        ///
        /// # Errors
        ///
        /// Returns an error if the query fails.
        pub async fn get_async(&self, id: FingerprintId) -> Result<Option<FingerprintRecord>> {
            let client = self.pool.get().await.map_err(pool_error)?;
            let query = format!("SELECT {RECORD_COLUMNS} FROM {} WHERE id = $1", self.table_name);
            client
                .query_opt(&query, &[&id.get()])
                .await
                .map_err(|e| query_error("postgres_get", &e))?
                .as_ref()
                .map(row_to_record)
                .transpose()
        }

        /// Attempts to store a new record; see [`FingerprintStore::insert`].
        ///
        /// # Errors
        ///
        /// Returns [`Error::ConnectionFailed`] before anything is sent and
        /// [`Error::AmbiguousWrite`] if the connection drops mid-statement.
        pub async fn insert_async(&self, candidate: &NewFingerprint) -> Result<InsertOutcome> {
            validate_candidate(candidate)?;
            let size_bytes = i64::try_from(candidate.size_bytes).map_err(|_| {
                Error::InvalidInput(format!("size {} too large", candidate.size_bytes))
            })?;

            let client = self.pool.get().await.map_err(pool_error)?;
            let insert = format!(
                "INSERT INTO {}
                     (source_name, source_path, fingerprint, size_bytes, algorithm, content_only)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id, created_at",
                self.table_name
            );
            let statement = client
                .prepare_cached(&insert)
                .await
                .map_err(|e| query_error("postgres_prepare_insert", &e))?;

            let inserted = client
                .query_one(
                    &statement,
                    &[
                        &candidate.source_name,
                        &candidate.source_path,
                        &candidate.fingerprint,
                        &size_bytes,
                        &candidate.algorithm.as_str(),
                        &candidate.content_only,
                    ],
                )
                .await;

            match inserted {
                Ok(row) => {
                    let created_at: i64 = row.get(1);
                    Ok(InsertOutcome::stored(FingerprintRecord {
                        id: FingerprintId::new(row.get(0)),
                        source_name: candidate.source_name.clone(),
                        source_path: candidate.source_path.clone(),
                        fingerprint: candidate.fingerprint.clone(),
                        size_bytes: candidate.size_bytes,
                        algorithm: candidate.algorithm,
                        content_only: candidate.content_only,
                        created_at: u64::try_from(created_at).unwrap_or_default(),
                    }))
                },
                Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                    drop(client);
                    // The conflicting transaction has committed by the time the
                    // violation is raised.
                    self.exists_async(&candidate.fingerprint, candidate.algorithm)
                        .await?
                        .map(InsertOutcome::duplicate)
                        .ok_or_else(|| Error::OperationFailed {
                            operation: "postgres_insert".to_string(),
                            cause: "unique constraint rejected insert but no conflicting row found"
                                .to_string(),
                        })
                },
                Err(e) => Err(insert_error(&e)),
            }
        }

        /// Returns the number of stored records.
        ///
        /// # Errors
        ///
        /// Returns an error if the query fails.
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        pub async fn count_async(&self) -> Result<usize> {
            let client = self.pool.get().await.map_err(pool_error)?;
            let query = format!("SELECT COUNT(*) FROM {}", self.table_name);
            let count: i64 = client
                .query_one(&query, &[])
                .await
                .map_err(|e| query_error("postgres_count", &e))?
                .get(0);
            Ok(count.max(0) as usize)
        }
    }

    impl FingerprintStore for PostgresFingerprintStore {
        #[instrument(
            skip(self),
            fields(operation = "bootstrap", backend = "postgresql", table = %self.table_name)
        )]
        fn bootstrap(&self) -> Result<()> {
            let start = Instant::now();
            observe(BACKEND, "bootstrap", start, self.block_on(self.bootstrap_async()))
        }

        #[instrument(skip(self), fields(operation = "exists", backend = "postgresql"))]
        fn exists(
            &self,
            fingerprint: &str,
            algorithm: HashAlgorithm,
        ) -> Result<Option<FingerprintRecord>> {
            let start = Instant::now();
            let result = self.block_on(self.exists_async(fingerprint, algorithm));
            observe(BACKEND, "exists", start, result)
        }

        #[instrument(skip(self), fields(operation = "find", backend = "postgresql"))]
        fn find(&self, fingerprint: &str) -> Result<Vec<FingerprintRecord>> {
            let start = Instant::now();
            observe(BACKEND, "find", start, self.block_on(self.find_async(fingerprint)))
        }

        #[instrument(skip(self), fields(operation = "get", backend = "postgresql", id = %id))]
        fn get(&self, id: FingerprintId) -> Result<Option<FingerprintRecord>> {
            let start = Instant::now();
            observe(BACKEND, "get", start, self.block_on(self.get_async(id)))
        }

        #[instrument(
            skip(self, candidate),
            fields(
                operation = "insert",
                backend = "postgresql",
                algorithm = %candidate.algorithm,
                source = %candidate.source_name
            )
        )]
        fn insert(&self, candidate: &NewFingerprint) -> Result<InsertOutcome> {
            let start = Instant::now();
            let result = self.block_on(self.insert_async(candidate));
            let status = match &result {
                Ok(outcome) if outcome.stored => "success",
                Ok(_) => "duplicate",
                Err(_) => "error",
            };
            record_operation_metrics(BACKEND, "insert", start, status);
            result
        }

        #[instrument(skip(self), fields(operation = "count", backend = "postgresql"))]
        fn count(&self) -> Result<usize> {
            let start = Instant::now();
            observe(BACKEND, "count", start, self.block_on(self.count_async()))
        }

        fn backend_name(&self) -> &'static str {
            BACKEND
        }
    }

    #[cfg(feature = "postgres-tls")]
    mod tls {
        use crate::{Error, Result};
        use std::sync::Arc;
        use tokio_postgres_rustls::MakeRustlsConnect;

        /// Builds a rustls connector trusting the Mozilla root set.
        pub fn connector() -> Result<MakeRustlsConnect> {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .map_err(|e| Error::ConnectionFailed {
                    operation: "postgres_tls_config".to_string(),
                    cause: e.to_string(),
                })?
                .with_root_certificates(roots)
                .with_no_client_auth();
            Ok(MakeRustlsConnect::new(config))
        }
    }

    #[cfg(not(feature = "postgres-tls"))]
    mod tls {
        use crate::{Error, Result};

        /// TLS was requested but is compiled out.
        pub fn connector() -> Result<tokio_postgres::NoTls> {
            Err(Error::FeatureNotEnabled("postgres-tls".to_string()))
        }
    }

}

#[cfg(feature = "postgres")]
pub use implementation::{DEFAULT_POOL_MAX_SIZE, PostgresFingerprintStore};

#[cfg(not(feature = "postgres"))]
mod stub {
    use crate::models::{
        FingerprintId, FingerprintRecord, HashAlgorithm, InsertOutcome, NewFingerprint,
    };
    use crate::storage::traits::FingerprintStore;
    use crate::{Error, Result};

    /// Default maximum connections in pool.
    pub const DEFAULT_POOL_MAX_SIZE: usize = 20;

    fn not_enabled() -> Error {
        Error::FeatureNotEnabled("postgres".to_string())
    }

    /// Stub PostgreSQL store when the `postgres` feature is not enabled.
    ///
    /// Construction always fails with [`Error::FeatureNotEnabled`].
    pub struct PostgresFingerprintStore {
        _private: (),
    }

    impl PostgresFingerprintStore {
        /// Always fails: requires the `postgres` feature.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn new(_connection_url: &str, _table_name: impl Into<String>) -> Result<Self> {
            Err(not_enabled())
        }

        /// Always fails: requires the `postgres` feature.
        ///
        /// # Errors
        ///
        /// Always returns [`Error::FeatureNotEnabled`].
        pub fn with_options(
            _connection_url: &str,
            _table_name: impl Into<String>,
            _pool_max_size: Option<usize>,
            _require_tls: bool,
        ) -> Result<Self> {
            Err(not_enabled())
        }
    }

    impl FingerprintStore for PostgresFingerprintStore {
        fn bootstrap(&self) -> Result<()> {
            Err(not_enabled())
        }

        fn exists(&self, _: &str, _: HashAlgorithm) -> Result<Option<FingerprintRecord>> {
            Err(not_enabled())
        }

        fn find(&self, _: &str) -> Result<Vec<FingerprintRecord>> {
            Err(not_enabled())
        }

        fn get(&self, _: FingerprintId) -> Result<Option<FingerprintRecord>> {
            Err(not_enabled())
        }

        fn insert(&self, _: &NewFingerprint) -> Result<InsertOutcome> {
            Err(not_enabled())
        }

        fn count(&self) -> Result<usize> {
            Err(not_enabled())
        }

        fn backend_name(&self) -> &'static str {
            "postgresql"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_stub_reports_feature_not_enabled() {
            let result =
                PostgresFingerprintStore::new("postgresql://localhost/docprint", "fingerprints");
            assert!(matches!(result, Err(Error::FeatureNotEnabled(ref f)) if f == "postgres"));
        }
    }
}

#[cfg(not(feature = "postgres"))]
pub use stub::{DEFAULT_POOL_MAX_SIZE, PostgresFingerprintStore};
