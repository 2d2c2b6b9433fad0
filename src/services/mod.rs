//! Business logic services.
//!
//! - [`ContentNormalizer`]: canonical bytes from extracted text
//! - [`FingerprintEngine`]: digests and algorithm comparison
//! - [`FingerprintService`]: the per-document pipeline over a store

mod fingerprint;
mod normalizer;
mod pipeline;

pub use fingerprint::{BenchmarkResult, FingerprintEngine};
pub use normalizer::ContentNormalizer;
pub use pipeline::{
    BatchReport, BatchSummary, DocumentFingerprint, Fingerprinter, FingerprintService,
    PipelineOptions,
};
