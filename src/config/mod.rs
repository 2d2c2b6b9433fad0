//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! environment variables. The binary loads `.env` into the environment
//! before any of this runs.
//!
//! # Example TOML
//!
//! ```toml
//! log_format = "json"
//!
//! [store]
//! backend = "postgres"
//! host = "db.internal"
//! user = "docprint"
//! password = "hunter2"
//! tls = true
//!
//! [pipeline]
//! algorithm = "sha3-256"
//! extensions = ["pdf"]
//! ```
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DOCPRINT_STORE` | `store.backend` (`sqlite` or `postgres`) |
//! | `DATABASE_URL` | `store.database_url` |
//! | `DOCPRINT_DB_HOST` / `_PORT` / `_USER` / `_PASSWORD` / `_NAME` | connection parts |
//! | `DOCPRINT_DB_TLS` | `store.tls` |
//! | `DOCPRINT_TABLE` | `store.table` |
//! | `DOCPRINT_POOL_MAX_SIZE` | `store.pool_max_size` |
//! | `DOCPRINT_SQLITE_PATH` | `store.sqlite_path` |
//! | `DOCPRINT_ALGORITHM` | `pipeline.algorithm` |
//! | `DOCPRINT_MODE` | `pipeline.mode` (`content` or `raw`) |
//! | `DOCPRINT_INCLUDE_RESOURCES` | `pipeline.include_resources` |
//! | `DOCPRINT_PRECHECK` | `pipeline.precheck` |
//! | `DOCPRINT_LOG_FORMAT` | `log_format` (`pretty` or `json`) |

use crate::models::{HashAlgorithm, NormalizationMode};
use crate::services::PipelineOptions;
use crate::storage::validate_table_name;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackendKind {
    /// Local `SQLite` file.
    #[default]
    Sqlite,
    /// PostgreSQL server (requires the `postgres` feature).
    Postgres,
}

impl StoreBackendKind {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for StoreBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(Error::InvalidInput(format!("unknown store backend '{other}'"))),
        }
    }
}

impl fmt::Display for StoreBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one event per line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!("unknown log format '{other}'"))),
        }
    }
}

/// Store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backend to open.
    pub backend: StoreBackendKind,
    /// Database file for the `SQLite` backend.
    pub sqlite_path: PathBuf,
    /// Full PostgreSQL URL; takes precedence over the individual parts.
    pub database_url: Option<SecretString>,
    /// PostgreSQL host.
    pub host: String,
    /// PostgreSQL port.
    pub port: u16,
    /// PostgreSQL user.
    pub user: Option<String>,
    /// PostgreSQL password.
    pub password: Option<SecretString>,
    /// PostgreSQL database name.
    pub dbname: String,
    /// Require TLS for PostgreSQL.
    pub tls: bool,
    /// Table holding fingerprint records.
    pub table: String,
    /// Maximum pooled PostgreSQL connections.
    pub pool_max_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Sqlite,
            sqlite_path: default_sqlite_path(),
            database_url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: None,
            password: None,
            dbname: "docprint".to_string(),
            tls: false,
            table: "fingerprints".to_string(),
            pool_max_size: 20,
        }
    }
}

impl StoreConfig {
    /// Returns the PostgreSQL connection string.
    ///
    /// `database_url` is returned as-is when set. Otherwise a key/value
    /// connection string is assembled from the individual parts.
    #[must_use]
    pub fn connection_url(&self) -> SecretString {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        let mut parts = vec![
            format!("host={}", quote_conninfo(&self.host)),
            format!("port={}", self.port),
            format!("dbname={}", quote_conninfo(&self.dbname)),
        ];
        if let Some(user) = &self.user {
            parts.push(format!("user={}", quote_conninfo(user)));
        }
        if let Some(password) = &self.password {
            parts.push(format!("password={}", quote_conninfo(password.expose_secret())));
        }
        if self.tls {
            parts.push("sslmode=require".to_string());
        }
        SecretString::from(parts.join(" "))
    }

    /// Checks values that cannot be checked while parsing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a bad table name or zero pool size.
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table)?;
        if self.pool_max_size == 0 {
            return Err(Error::InvalidInput(
                "pool_max_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Quotes a conninfo value when it contains spaces, quotes or backslashes.
fn quote_conninfo(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

fn default_sqlite_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "docprint").map_or_else(
        || PathBuf::from("docprint.db"),
        |dirs| dirs.data_dir().join("fingerprints.db"),
    )
}

/// Main configuration.
#[derive(Debug, Clone)]
pub struct DocprintConfig {
    /// Store settings.
    pub store: StoreConfig,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Content-only or raw-byte fingerprints.
    pub mode: NormalizationMode,
    /// Append embedded resources to normalised text.
    pub include_resources: bool,
    /// Consult the store before inserting.
    pub precheck: bool,
    /// Extensions picked up when walking directories; empty means all.
    pub extensions: Vec<String>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for DocprintConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            algorithm: HashAlgorithm::default(),
            mode: NormalizationMode::default(),
            include_resources: false,
            precheck: true,
            extensions: Vec::new(),
            log_format: LogFormat::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
///
/// Not `Debug`: the store section may carry a plaintext password.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Log format.
    pub log_format: Option<String>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Pipeline section.
    pub pipeline: Option<ConfigFilePipeline>,
}

/// `[store]` section in config file.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileStore {
    /// Backend name.
    pub backend: Option<String>,
    /// `SQLite` path.
    pub sqlite_path: Option<String>,
    /// Full PostgreSQL URL.
    pub database_url: Option<String>,
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// User.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Database name.
    pub dbname: Option<String>,
    /// Require TLS.
    pub tls: Option<bool>,
    /// Table name.
    pub table: Option<String>,
    /// Pool size.
    pub pool_max_size: Option<usize>,
}

/// `[pipeline]` section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFilePipeline {
    /// Algorithm name.
    pub algorithm: Option<String>,
    /// `content` or `raw`.
    pub mode: Option<String>,
    /// Include embedded resources.
    pub include_resources: Option<bool>,
    /// Check before insert.
    pub precheck: Option<bool>,
    /// Directory walk extensions.
    pub extensions: Option<Vec<String>>,
}

impl DocprintConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults, then the config file, then the process environment.
    ///
    /// An explicit `path` must exist. Without one, the platform config
    /// directory (`<config dir>/docprint/config.toml`) is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if any
    /// value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        match path {
            Some(path) => config.apply_file(&Self::read_file(path)?)?,
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.exists()) {
                    tracing::debug!(path = %path.display(), "Loading config file");
                    config.apply_file(&Self::read_file(&path)?)?;
                }
            },
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.store.validate()?;
        Ok(config)
    }

    /// Returns `<config dir>/docprint/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("docprint").join("config.toml"))
    }

    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn read_file(path: &Path) -> Result<ConfigFile> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        toml::from_str(&contents).map_err(|e| Error::InvalidInput(format!(
            "config file {}: {e}",
            path.display()
        )))
    }

    /// Overlays values present in a parsed config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] or [`Error::UnsupportedAlgorithm`]
    /// for values that do not parse.
    pub fn apply_file(&mut self, file: &ConfigFile) -> Result<()> {
        if let Some(format) = &file.log_format {
            self.log_format = format.parse()?;
        }
        if let Some(store) = &file.store {
            let target = &mut self.store;
            if let Some(backend) = &store.backend {
                target.backend = backend.parse()?;
            }
            if let Some(path) = &store.sqlite_path {
                target.sqlite_path = PathBuf::from(path);
            }
            if let Some(url) = &store.database_url {
                target.database_url = Some(SecretString::from(url.clone()));
            }
            if let Some(host) = &store.host {
                target.host.clone_from(host);
            }
            if let Some(port) = store.port {
                target.port = port;
            }
            if store.user.is_some() {
                target.user.clone_from(&store.user);
            }
            if let Some(password) = &store.password {
                target.password = Some(SecretString::from(password.clone()));
            }
            if let Some(dbname) = &store.dbname {
                target.dbname.clone_from(dbname);
            }
            if let Some(tls) = store.tls {
                target.tls = tls;
            }
            if let Some(table) = &store.table {
                target.table.clone_from(table);
            }
            if let Some(size) = store.pool_max_size {
                target.pool_max_size = size;
            }
        }
        if let Some(pipeline) = &file.pipeline {
            if let Some(algorithm) = &pipeline.algorithm {
                self.algorithm = HashAlgorithm::parse(algorithm)?;
            }
            if let Some(mode) = &pipeline.mode {
                self.mode = NormalizationMode::parse(mode)?;
            }
            if let Some(v) = pipeline.include_resources {
                self.include_resources = v;
            }
            if let Some(v) = pipeline.precheck {
                self.precheck = v;
            }
            if let Some(extensions) = &pipeline.extensions {
                self.extensions = normalize_extensions(extensions);
            }
        }
        Ok(())
    }

    /// Overlays values from an environment lookup.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] or [`Error::UnsupportedAlgorithm`]
    /// for values that do not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let store = &mut self.store;

        if let Some(v) = get("DOCPRINT_STORE") {
            store.backend = v.parse()?;
        }
        if let Some(v) = get("DATABASE_URL") {
            store.database_url = Some(SecretString::from(v));
        }
        if let Some(v) = get("DOCPRINT_DB_HOST") {
            store.host = v;
        }
        if let Some(v) = get("DOCPRINT_DB_PORT") {
            store.port = parse_number("DOCPRINT_DB_PORT", &v)?;
        }
        if let Some(v) = get("DOCPRINT_DB_USER") {
            store.user = Some(v);
        }
        if let Some(v) = get("DOCPRINT_DB_PASSWORD") {
            store.password = Some(SecretString::from(v));
        }
        if let Some(v) = get("DOCPRINT_DB_NAME") {
            store.dbname = v;
        }
        if let Some(v) = get("DOCPRINT_DB_TLS") {
            store.tls = parse_bool("DOCPRINT_DB_TLS", &v)?;
        }
        if let Some(v) = get("DOCPRINT_TABLE") {
            store.table = v;
        }
        if let Some(v) = get("DOCPRINT_POOL_MAX_SIZE") {
            store.pool_max_size = parse_number("DOCPRINT_POOL_MAX_SIZE", &v)?;
        }
        if let Some(v) = get("DOCPRINT_SQLITE_PATH") {
            store.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = get("DOCPRINT_ALGORITHM") {
            self.algorithm = HashAlgorithm::parse(&v)?;
        }
        if let Some(v) = get("DOCPRINT_MODE") {
            self.mode = NormalizationMode::parse(&v)?;
        }
        if let Some(v) = get("DOCPRINT_INCLUDE_RESOURCES") {
            self.include_resources = parse_bool("DOCPRINT_INCLUDE_RESOURCES", &v)?;
        }
        if let Some(v) = get("DOCPRINT_PRECHECK") {
            self.precheck = parse_bool("DOCPRINT_PRECHECK", &v)?;
        }
        if let Some(v) = get("DOCPRINT_LOG_FORMAT") {
            self.log_format = v.parse()?;
        }
        Ok(())
    }

    /// Builds pipeline options from this configuration.
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            algorithm: self.algorithm,
            mode: self.mode,
            include_resources: self.include_resources,
            precheck: self.precheck,
            extensions: self.extensions.clone(),
        }
    }
}

/// Lowercases extensions and strips any leading dot.
#[must_use]
pub fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidInput(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("{key}: expected a number, got '{value}'")))
}
