//! # Docprint
//!
//! Content fingerprinting and duplicate-checked storage for documents.
//!
//! Docprint computes a fingerprint over the *meaningful* content of a
//! document (its extracted text, normalised) and records it in a store that
//! enforces uniqueness atomically at write time. Two copies of the same
//! document that differ only in authoring metadata or whitespace produce the
//! same fingerprint and are reported as duplicates.
//!
//! ## Features
//!
//! - Five digest algorithms (`BLAKE2b-512`, `SHA-256`, `SHA-512`, `SHA3-256`, `SHA3-512`)
//! - Whitespace-insensitive content normalisation with an explicit raw-byte fallback
//! - At-most-once insertion backed by a storage-level unique constraint
//! - Pluggable backends (`SQLite`, PostgreSQL behind the `postgres` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use docprint::{FingerprintService, PipelineOptions};
//! use docprint::extraction::PlainTextExtractor;
//! use docprint::storage::SqliteFingerprintStore;
//!
//! let store = SqliteFingerprintStore::new("fingerprints.db")?;
//! let service =
//!     FingerprintService::new(store, PlainTextExtractor::new(), PipelineOptions::default());
//!
//! let first = service.process("resume.txt", "docs/resume.txt", b"Hello World")?;
//! assert!(first.stored);
//! let second = service.process("copy.txt", "docs/copy.txt", b"Hello\n\nWorld  ")?;
//! assert!(!second.stored);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod extraction;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{DocprintConfig, StoreBackendKind, StoreConfig};
pub use models::{
    FingerprintId, FingerprintRecord, HashAlgorithm, InsertOutcome, NewFingerprint,
    NormalizationMode, PipelineState, ProcessResult,
};
pub use services::{
    BatchSummary, BenchmarkResult, ContentNormalizer, FingerprintEngine, FingerprintService,
    PipelineOptions,
};
pub use storage::{FingerprintStore, SqliteFingerprintStore, open_store};

/// Error type for docprint operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Caller action |
/// |---------|-------------|---------------|
/// | `InvalidInput` | Malformed config values, bad table names | Fix input |
/// | `UnsupportedAlgorithm` | Unknown algorithm name | Fix input |
/// | `UnparseableDocument` | A [`extraction::TextExtractor`] rejects the bytes | None (wrapped) |
/// | `ExtractionFailed` | Normalisation could not obtain text | Orchestrator hashes raw bytes |
/// | `ConnectionFailed` | Pool exhausted, connect refused, database busy | Retry |
/// | `AmbiguousWrite` | Connection lost mid-write, commit failed | `exists` first, then retry |
/// | `SchemaBootstrapFailed` | Table/index creation or migration failed | Abort startup |
/// | `OperationFailed` | Any other I/O or query failure, nothing written | Inspect |
/// | `FeatureNotEnabled` | Backend compiled out | Rebuild with feature |
///
/// A unique-constraint rejection is *not* an error: stores translate it into
/// [`InsertOutcome::duplicate`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested digest algorithm is not in the supported set.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The text extractor could not parse the document.
    #[error("unparseable document: {reason}")]
    UnparseableDocument {
        /// Why the extractor gave up.
        reason: String,
    },

    /// Content extraction failed for a document.
    ///
    /// The orchestrator recovers from this by fingerprinting raw bytes and
    /// marking the result `content_only = false`.
    #[error("extraction failed for '{source_name}': {cause}")]
    ExtractionFailed {
        /// Informational name of the document.
        source_name: String,
        /// The underlying cause.
        cause: String,
    },

    /// The store could not be reached; nothing was written.
    #[error("connection failed during '{operation}': {cause}")]
    ConnectionFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A write was attempted but its outcome is unknown.
    #[error("ambiguous outcome for '{operation}': {cause}")]
    AmbiguousWrite {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The backing table or indexes could not be created.
    #[error("schema bootstrap failed: {cause}")]
    SchemaBootstrapFailed {
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed without writing anything.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Returns true if the caller may retry the same call unchanged.
    ///
    /// Only failures that are known to have written nothing qualify.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// Returns true if the caller must re-check with `exists` before retrying.
    #[must_use]
    pub const fn requires_recheck(&self) -> bool {
        matches!(self, Self::AmbiguousWrite { .. })
    }
}

/// Result type alias for docprint operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
