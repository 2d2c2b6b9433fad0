//! PostgreSQL schema migrations.
//!
//! Migrations are embedded in the binary and applied on connect. Each
//! migration's SQL may hold several `;`-separated statements and uses
//! `{table}` as a placeholder for the configured table name.
//!
//! ```rust,ignore
//! use docprint::storage::migrations::{Migration, MigrationRunner};
//!
//! const MIGRATIONS: &[Migration] = &[Migration {
//!     version: 1,
//!     description: "Initial table",
//!     sql: "CREATE TABLE IF NOT EXISTS {table} (id BIGSERIAL PRIMARY KEY);",
//! }];
//!
//! MigrationRunner::new(pool, "fingerprints").run(MIGRATIONS).await?;
//! ```

use crate::{Error, Result};

/// A single migration with version and SQL.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Migration version (sequential, starting at 1).
    pub version: i32,
    /// Human-readable description.
    pub description: &'static str,
    /// SQL to apply. `{table}` is replaced with the table name.
    pub sql: &'static str,
}

impl Migration {
    /// Returns the statements of this migration for `table`.
    #[must_use]
    pub fn statements(&self, table: &str) -> Vec<String> {
        self.sql
            .replace("{table}", table)
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Maximum version across a set of migrations.
#[must_use]
pub const fn max_version(migrations: &[Migration]) -> i32 {
    let mut max = 0;
    let mut i = 0;
    while i < migrations.len() {
        if migrations[i].version > max {
            max = migrations[i].version;
        }
        i += 1;
    }
    max
}

/// Checks the version a table reports after its migrations ran.
///
/// A version below the newest embedded migration means the run did not take
/// effect. A higher version means a newer build migrated the table; that is
/// logged and accepted. Returns the recorded version.
///
/// # Errors
///
/// Returns [`Error::SchemaBootstrapFailed`] if the table is behind.
pub fn verify_version(table: &str, recorded: i32, migrations: &[Migration]) -> Result<i32> {
    let expected = max_version(migrations);
    if recorded < expected {
        return Err(Error::SchemaBootstrapFailed {
            cause: format!("schema for '{table}' is at v{recorded}, expected v{expected}"),
        });
    }
    if recorded > expected {
        tracing::warn!(
            table,
            recorded,
            expected,
            "Schema is newer than this build's migrations"
        );
    } else {
        tracing::debug!(table, version = recorded, "Schema up to date");
    }
    Ok(recorded)
}

#[cfg(feature = "postgres")]
mod implementation {
    use super::Migration;
    use crate::{Error, Result};
    use deadpool_postgres::Pool;

    fn bootstrap_error(step: &str, e: impl std::fmt::Display) -> Error {
        Error::SchemaBootstrapFailed {
            cause: format!("{step}: {e}"),
        }
    }

    /// Runs migrations for one PostgreSQL table.
    ///
    /// All pending migrations are applied in a single transaction that holds
    /// a transaction-scoped advisory lock keyed on the table name, so several
    /// processes bootstrapping the same table at once apply each migration
    /// exactly once.
    pub struct MigrationRunner {
        pool: Pool,
        table_name: String,
    }

    impl MigrationRunner {
        /// Creates a new migration runner.
        #[must_use]
        pub fn new(pool: Pool, table_name: impl Into<String>) -> Self {
            Self {
                pool,
                table_name: table_name.into(),
            }
        }

        /// Returns the table name.
        #[must_use]
        pub fn table_name(&self) -> &str {
            &self.table_name
        }

        fn migrations_table_name(&self) -> String {
            format!("{}_schema_migrations", self.table_name)
        }

        /// Applies every migration newer than the recorded version.
        ///
        /// # Errors
        ///
        /// Returns [`Error::ConnectionFailed`] if no connection can be
        /// obtained and [`Error::SchemaBootstrapFailed`] if any statement
        /// fails. A failed run leaves the schema unchanged.
        pub async fn run(&self, migrations: &[Migration]) -> Result<()> {
            let mut client = self.pool.get().await.map_err(|e| Error::ConnectionFailed {
                operation: "migration_get_connection".to_string(),
                cause: e.to_string(),
            })?;
            let migrations_table = self.migrations_table_name();

            let tx = client
                .transaction()
                .await
                .map_err(|e| bootstrap_error("begin", e))?;

            tx.execute("SELECT pg_advisory_xact_lock(hashtext($1))", &[&self.table_name])
                .await
                .map_err(|e| bootstrap_error("advisory_lock", e))?;

            tx.batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {migrations_table} (
                    version INTEGER PRIMARY KEY,
                    description TEXT NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"
            ))
            .await
            .map_err(|e| bootstrap_error("create_migrations_table", e))?;

            let current: i32 = tx
                .query_one(
                    &format!("SELECT COALESCE(MAX(version), 0) FROM {migrations_table}"),
                    &[],
                )
                .await
                .map(|row| row.get(0))
                .map_err(|e| bootstrap_error("current_version", e))?;

            let record_sql =
                format!("INSERT INTO {migrations_table} (version, description) VALUES ($1, $2)");
            let mut applied = Vec::new();
            for migration in migrations.iter().filter(|m| m.version > current) {
                for statement in migration.statements(&self.table_name) {
                    tx.execute(statement.as_str(), &[]).await.map_err(|e| {
                        bootstrap_error(
                            &format!("migration_v{}: {}", migration.version, migration.description),
                            e,
                        )
                    })?;
                }
                tx.execute(&record_sql, &[&migration.version, &migration.description])
                    .await
                    .map_err(|e| bootstrap_error("record_migration", e))?;
                applied.push(migration);
            }

            tx.commit()
                .await
                .map_err(|e| bootstrap_error("commit", e))?;

            for migration in applied {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    table = self.table_name,
                    "Applied migration"
                );
            }
            Ok(())
        }

        /// Returns the recorded schema version, 0 if never migrated.
        ///
        /// # Errors
        ///
        /// Returns an error if the database cannot be queried.
        pub async fn current_version(&self) -> Result<i32> {
            let client = self.pool.get().await.map_err(|e| Error::ConnectionFailed {
                operation: "migration_get_connection".to_string(),
                cause: e.to_string(),
            })?;
            let migrations_table = self.migrations_table_name();
            let exists: bool = client
                .query_one("SELECT to_regclass($1) IS NOT NULL", &[&migrations_table])
                .await
                .map(|row| row.get(0))
                .map_err(|e| Error::OperationFailed {
                    operation: "migration_table_exists".to_string(),
                    cause: e.to_string(),
                })?;
            if !exists {
                return Ok(0);
            }
            client
                .query_one(
                    &format!("SELECT COALESCE(MAX(version), 0) FROM {migrations_table}"),
                    &[],
                )
                .await
                .map(|row| row.get(0))
                .map_err(|e| Error::OperationFailed {
                    operation: "migration_current_version".to_string(),
                    cause: e.to_string(),
                })
        }
    }
}

#[cfg(feature = "postgres")]
pub use implementation::MigrationRunner;
