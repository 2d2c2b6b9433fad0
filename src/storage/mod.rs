//! Fingerprint storage.
//!
//! - [`FingerprintStore`]: the store contract
//! - [`SqliteFingerprintStore`]: local file backend
//! - [`PostgresFingerprintStore`]: server backend (`postgres` feature)
//! - [`open_store`]: builds the configured backend

// Dropping the connection guard a statement early buys nothing here.
#![allow(clippy::significant_drop_tightening)]

mod factory;
mod metrics;
pub mod migrations;
pub mod persistence;
pub mod sqlite;
mod traits;

pub use factory::open_store;
pub use persistence::{
    DEFAULT_POOL_MAX_SIZE, DEFAULT_TABLE, PostgresFingerprintStore, SqliteFingerprintStore,
};
pub use traits::{FingerprintStore, validate_candidate, validate_table_name};
