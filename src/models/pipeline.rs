//! Orchestrator states and per-document results.

use super::{FingerprintId, FingerprintRecord, HashAlgorithm};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the per-document pipeline.
///
/// ```text
/// Pending → Extracting → Normalizing → Fingerprinting → Checking → Stored    → Done
///                 │                          ▲                  └→ Duplicate → Done
///                 └──── ExtractionFailed ────┘
/// ```
///
/// Raw mode skips extraction: `Pending → Fingerprinting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing has happened yet.
    Pending,
    /// Text is being extracted.
    Extracting,
    /// Extraction failed; raw bytes will be fingerprinted.
    ExtractionFailed,
    /// Extracted text is being normalised.
    Normalizing,
    /// The digest is being computed.
    Fingerprinting,
    /// The store is being consulted.
    Checking,
    /// A new record was written.
    Stored,
    /// The content was already present.
    Duplicate,
    /// Terminal state.
    Done,
}

impl PipelineState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracting => "extracting",
            Self::ExtractionFailed => "extraction_failed",
            Self::Normalizing => "normalizing",
            Self::Fingerprinting => "fingerprinting",
            Self::Checking => "checking",
            Self::Stored => "stored",
            Self::Duplicate => "duplicate",
            Self::Done => "done",
        }
    }

    /// Returns true if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Extracting | Self::Fingerprinting)
                | (Self::Extracting, Self::Normalizing | Self::ExtractionFailed)
                | (Self::ExtractionFailed | Self::Normalizing, Self::Fingerprinting)
                | (Self::Fingerprinting, Self::Checking | Self::Done)
                | (Self::Checking, Self::Stored | Self::Duplicate | Self::Done)
                | (Self::Stored | Self::Duplicate, Self::Done)
        )
    }

    /// Returns true for the terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running one document through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Informational document name.
    pub source_name: String,
    /// Lowercase hex digest.
    pub fingerprint: String,
    /// Algorithm used.
    pub algorithm: HashAlgorithm,
    /// True if the digest covers normalised content only.
    pub content_only: bool,
    /// Size of the original document.
    pub size_bytes: u64,
    /// Wall-clock time spent in the pipeline, in milliseconds.
    pub elapsed_ms: f64,
    /// True if a new record was written.
    pub stored: bool,
    /// Existing record when the content was already known.
    pub conflicting_record: Option<FingerprintRecord>,
    /// Identifier of the newly written record.
    pub record_id: Option<FingerprintId>,
    /// Page count reported by the extractor.
    pub page_count: Option<usize>,
    /// Why content extraction was abandoned, when the raw-byte fallback ran.
    pub fallback_reason: Option<String>,
    /// States visited, in order.
    pub trace: Vec<PipelineState>,
}

impl ProcessResult {
    /// True if this document matched an existing record.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        self.conflicting_record.is_some()
    }

    /// True if the raw-byte fallback was taken.
    #[must_use]
    pub const fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_path_transitions() {
        let path = [
            PipelineState::Pending,
            PipelineState::Extracting,
            PipelineState::Normalizing,
            PipelineState::Fingerprinting,
            PipelineState::Checking,
            PipelineState::Stored,
            PipelineState::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_fallback_path_transitions() {
        assert!(PipelineState::Extracting.can_transition_to(PipelineState::ExtractionFailed));
        assert!(PipelineState::ExtractionFailed.can_transition_to(PipelineState::Fingerprinting));
        assert!(!PipelineState::ExtractionFailed.can_transition_to(PipelineState::Normalizing));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!PipelineState::Pending.can_transition_to(PipelineState::Stored));
        assert!(!PipelineState::Stored.can_transition_to(PipelineState::Duplicate));
        assert!(!PipelineState::Done.can_transition_to(PipelineState::Pending));
        assert!(!PipelineState::Normalizing.can_transition_to(PipelineState::Checking));
    }

    #[test]
    fn test_terminal() {
        assert!(PipelineState::Done.is_terminal());
        assert!(!PipelineState::Stored.is_terminal());
    }
}
