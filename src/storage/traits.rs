//! Fingerprint store trait.

use crate::models::{FingerprintId, FingerprintRecord, HashAlgorithm, InsertOutcome, NewFingerprint};
use crate::{Error, Result};
use std::sync::Arc;

/// Persistent store of fingerprint records.
///
/// The store, not the caller, decides uniqueness. `(fingerprint, algorithm)`
/// is enforced by a constraint in the storage engine and checked atomically
/// by [`FingerprintStore::insert`]. [`FingerprintStore::exists`] is a
/// read-only fast path and does not reserve anything.
///
/// Implementations must be safe to share between threads, and an insert
/// that is abandoned part-way must leave no record behind.
pub trait FingerprintStore: Send + Sync {
    /// Ensures the backing table and indexes exist. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaBootstrapFailed`] if the schema cannot be created.
    fn bootstrap(&self) -> Result<()>;

    /// Looks up the record holding `(fingerprint, algorithm)`.
    fn exists(
        &self,
        fingerprint: &str,
        algorithm: HashAlgorithm,
    ) -> Result<Option<FingerprintRecord>>;

    /// Returns every record with this fingerprint, across algorithms.
    fn find(&self, fingerprint: &str) -> Result<Vec<FingerprintRecord>>;

    /// Retrieves a record by identifier.
    fn get(&self, id: FingerprintId) -> Result<Option<FingerprintRecord>>;

    /// Attempts to store a new record.
    ///
    /// Returns `stored = true` with the new record, or `stored = false` with
    /// the record that already holds the key. A constraint rejection is never
    /// returned as an error.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the fingerprint is malformed (nothing written)
    /// - [`Error::ConnectionFailed`] if the store was unreachable (nothing written)
    /// - [`Error::AmbiguousWrite`] if the outcome is unknown
    fn insert(&self, candidate: &NewFingerprint) -> Result<InsertOutcome>;

    /// Returns the number of stored records.
    fn count(&self) -> Result<usize>;

    /// Short backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Rejects candidates whose fingerprint cannot have come from their algorithm.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on a length or alphabet mismatch.
pub fn validate_candidate(candidate: &NewFingerprint) -> Result<()> {
    let expected = candidate.algorithm.hex_len();
    if candidate.fingerprint.len() != expected {
        return Err(Error::InvalidInput(format!(
            "{} fingerprint must be {expected} hex chars, got {}",
            candidate.algorithm,
            candidate.fingerprint.len()
        )));
    }
    if !candidate
        .fingerprint
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(Error::InvalidInput(
            "fingerprint must be lowercase hexadecimal".to_string(),
        ));
    }
    Ok(())
}

/// Validates a table name that will be interpolated into SQL.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless the name matches
/// `[A-Za-z_][A-Za-z0-9_]{0,62}`.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid table name '{name}'")))
    }
}

macro_rules! forward_store {
    ($($ty:ty),*) => {$(
        impl<T: FingerprintStore + ?Sized> FingerprintStore for $ty {
            fn bootstrap(&self) -> Result<()> {
                (**self).bootstrap()
            }

            fn exists(
                &self,
                fingerprint: &str,
                algorithm: HashAlgorithm,
            ) -> Result<Option<FingerprintRecord>> {
                (**self).exists(fingerprint, algorithm)
            }

            fn find(&self, fingerprint: &str) -> Result<Vec<FingerprintRecord>> {
                (**self).find(fingerprint)
            }

            fn get(&self, id: FingerprintId) -> Result<Option<FingerprintRecord>> {
                (**self).get(id)
            }

            fn insert(&self, candidate: &NewFingerprint) -> Result<InsertOutcome> {
                (**self).insert(candidate)
            }

            fn count(&self) -> Result<usize> {
                (**self).count()
            }

            fn backend_name(&self) -> &'static str {
                (**self).backend_name()
            }
        }
    )*};
}

forward_store!(&T, Box<T>, Arc<T>);

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(fingerprint: &str, algorithm: HashAlgorithm) -> NewFingerprint {
        NewFingerprint {
            source_name: "a".to_string(),
            source_path: "a".to_string(),
            fingerprint: fingerprint.to_string(),
            size_bytes: 1,
            algorithm,
            content_only: true,
        }
    }

    #[test]
    fn test_validate_candidate_length() {
        assert!(validate_candidate(&candidate(&"a".repeat(64), HashAlgorithm::Sha256)).is_ok());
        assert!(
            validate_candidate(&candidate(&"a".repeat(128), HashAlgorithm::Blake2b512)).is_ok()
        );
        assert!(matches!(
            validate_candidate(&candidate(&"a".repeat(64), HashAlgorithm::Sha512)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_validate_candidate_alphabet() {
        assert!(validate_candidate(&candidate(&"A".repeat(64), HashAlgorithm::Sha256)).is_err());
        assert!(validate_candidate(&candidate(&"g".repeat(64), HashAlgorithm::Sha256)).is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("fingerprints").is_ok());
        assert!(validate_table_name("_t1").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1abc").is_err());
        assert!(validate_table_name("x; DROP TABLE y").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }
}
