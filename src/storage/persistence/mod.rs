//! Fingerprint store backends.

mod postgresql;
mod sqlite;

pub use postgresql::{DEFAULT_POOL_MAX_SIZE, PostgresFingerprintStore};
pub use sqlite::{DEFAULT_TABLE, SqliteFingerprintStore};
