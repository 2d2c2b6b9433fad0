//! Store construction from configuration.

use crate::config::{StoreBackendKind, StoreConfig};
use crate::storage::persistence::{PostgresFingerprintStore, SqliteFingerprintStore};
use crate::storage::traits::FingerprintStore;
use crate::Result;
use secrecy::ExposeSecret;

/// Opens and bootstraps the configured store.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidInput`] for invalid settings,
/// [`crate::Error::FeatureNotEnabled`] for a compiled-out backend, and any
/// connection or bootstrap error from the backend.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn FingerprintStore>> {
    config.validate()?;
    let store: Box<dyn FingerprintStore> = match config.backend {
        StoreBackendKind::Sqlite => Box::new(SqliteFingerprintStore::with_table(
            &config.sqlite_path,
            config.table.as_str(),
        )?),
        StoreBackendKind::Postgres => Box::new(PostgresFingerprintStore::with_options(
            config.connection_url().expose_secret(),
            config.table.as_str(),
            Some(config.pool_max_size),
            config.tls,
        )?),
    };
    tracing::debug!(
        backend = store.backend_name(),
        table = %config.table,
        "Opened fingerprint store"
    );
    Ok(store)
}
