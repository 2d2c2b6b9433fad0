//! Row conversion for the fingerprint table.

use crate::models::{FingerprintId, FingerprintRecord, HashAlgorithm};
use crate::{Error, Result};

/// Column list matching [`FingerprintRow::from_row`].
pub const RECORD_COLUMNS: &str =
    "id, source_name, source_path, fingerprint, size_bytes, algorithm, content_only, created_at";

/// A fingerprint row with database-native types.
#[derive(Debug)]
pub struct FingerprintRow {
    /// Row identifier.
    pub id: i64,
    /// Informational document name.
    pub source_name: String,
    /// Informational document path.
    pub source_path: String,
    /// Lowercase hex digest.
    pub fingerprint: String,
    /// Raw document size.
    pub size_bytes: i64,
    /// Algorithm name as stored.
    pub algorithm: String,
    /// Whether the digest covers normalised content.
    pub content_only: bool,
    /// Unix seconds, assigned by the database.
    pub created_at: i64,
}

impl FingerprintRow {
    /// Reads a row selected with [`RECORD_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_name: row.get(1)?,
            source_path: row.get(2)?,
            fingerprint: row.get(3)?,
            size_bytes: row.get(4)?,
            algorithm: row.get(5)?,
            content_only: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    /// Converts into a [`FingerprintRecord`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the stored algorithm name is not recognised.
    pub fn into_record(self) -> Result<FingerprintRecord> {
        let algorithm =
            HashAlgorithm::parse(&self.algorithm).map_err(|e| Error::OperationFailed {
                operation: "sqlite_decode_row".to_string(),
                cause: e.to_string(),
            })?;
        Ok(FingerprintRecord {
            id: FingerprintId::new(self.id),
            source_name: self.source_name,
            source_path: self.source_path,
            fingerprint: self.fingerprint,
            size_bytes: u64::try_from(self.size_bytes).unwrap_or_default(),
            algorithm,
            content_only: self.content_only,
            created_at: u64::try_from(self.created_at).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(algorithm: &str) -> FingerprintRow {
        FingerprintRow {
            id: 7,
            source_name: "a.pdf".to_string(),
            source_path: "/docs/a.pdf".to_string(),
            fingerprint: "ab".repeat(32),
            size_bytes: 1024,
            algorithm: algorithm.to_string(),
            content_only: true,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_into_record() {
        let record = row("sha256").into_record().unwrap();
        assert_eq!(record.id.get(), 7);
        assert_eq!(record.algorithm, HashAlgorithm::Sha256);
        assert_eq!(record.size_bytes, 1024);
        assert_eq!(record.created_at, 1_700_000_000);
    }

    #[test]
    fn test_into_record_rejects_unknown_algorithm() {
        assert!(matches!(
            row("md5").into_record(),
            Err(Error::OperationFailed { .. })
        ));
    }
}
