//! Fingerprint records and insert outcomes.

use super::HashAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned sequential identifier of a fingerprint record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintId(i64);

impl FingerprintId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for FingerprintId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A fingerprint that has not been stored yet.
///
/// `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFingerprint {
    /// Informational document name.
    pub source_name: String,
    /// Informational document location.
    pub source_path: String,
    /// Lowercase hex digest; the uniqueness key together with `algorithm`.
    pub fingerprint: String,
    /// Size of the original document in bytes.
    pub size_bytes: u64,
    /// Algorithm that produced `fingerprint`.
    pub algorithm: HashAlgorithm,
    /// True if computed over normalised content rather than raw bytes.
    pub content_only: bool,
}

/// A stored fingerprint. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    /// Store-assigned identifier.
    pub id: FingerprintId,
    /// Informational document name.
    pub source_name: String,
    /// Informational document location.
    pub source_path: String,
    /// Lowercase hex digest.
    pub fingerprint: String,
    /// Size of the original document in bytes.
    pub size_bytes: u64,
    /// Algorithm that produced `fingerprint`.
    pub algorithm: HashAlgorithm,
    /// True if computed over normalised content rather than raw bytes.
    pub content_only: bool,
    /// Insert time (Unix epoch seconds), assigned by the store.
    pub created_at: u64,
}

impl FingerprintRecord {
    /// Returns `created_at` as a UTC datetime.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Returns true if `other` is the same logical document.
    ///
    /// Provenance and timestamps are ignored.
    #[must_use]
    pub fn same_content(&self, other: &NewFingerprint) -> bool {
        self.fingerprint == other.fingerprint && self.algorithm == other.algorithm
    }
}

/// Result of [`crate::storage::FingerprintStore::insert`].
///
/// A duplicate is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    /// True if this call created the record.
    pub stored: bool,
    /// The record created by this call (when `stored`).
    pub record: Option<FingerprintRecord>,
    /// The record that already held the `(fingerprint, algorithm)` key.
    pub conflicting_record: Option<FingerprintRecord>,
}

impl InsertOutcome {
    /// Outcome for a successful insert.
    #[must_use]
    pub const fn stored(record: FingerprintRecord) -> Self {
        Self {
            stored: true,
            record: Some(record),
            conflicting_record: None,
        }
    }

    /// Outcome for a rejected duplicate.
    #[must_use]
    pub const fn duplicate(existing: FingerprintRecord) -> Self {
        Self {
            stored: false,
            record: None,
            conflicting_record: Some(existing),
        }
    }

    /// Returns the record that owns the key after this call, whoever wrote it.
    #[must_use]
    pub const fn winner(&self) -> Option<&FingerprintRecord> {
        match (&self.record, &self.conflicting_record) {
            (Some(record), _) | (None, Some(record)) => Some(record),
            (None, None) => None,
        }
    }
}
