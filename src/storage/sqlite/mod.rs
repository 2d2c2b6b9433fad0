//! Shared `SQLite` infrastructure.
//!
//! - [`connection`]: mutex handling, pragmas, error classification
//! - [`row`]: row decoding for the fingerprint table

mod connection;
mod row;

pub use connection::{
    BUSY_TIMEOUT_MS, acquire_lock, classify_error, configure_connection, is_unique_violation,
};
pub use row::{FingerprintRow, RECORD_COLUMNS};
