//! Data models for docprint.
//!
//! This module contains the core data structures shared by the normaliser,
//! the fingerprint engine, the stores and the orchestrator.

mod algorithm;
mod pipeline;
mod record;

pub use algorithm::{HashAlgorithm, NormalizationMode};
pub use pipeline::{PipelineState, ProcessResult};
pub use record::{FingerprintId, FingerprintRecord, InsertOutcome, NewFingerprint};
