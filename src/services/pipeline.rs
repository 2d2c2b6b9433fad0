//! Document pipeline orchestrator.
//!
//! Wires extraction → normalisation → fingerprinting → duplicate-checked
//! storage and reports the outcome of each document. Transient store
//! failures are returned to the caller unchanged; this layer never retries.

use super::fingerprint::FingerprintEngine;
use super::normalizer::ContentNormalizer;
use crate::extraction::TextExtractor;
use crate::models::{
    FingerprintRecord, HashAlgorithm, NewFingerprint, NormalizationMode, PipelineState,
    ProcessResult,
};
use crate::storage::FingerprintStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

/// Per-service pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Content-only or raw-byte fingerprints.
    pub mode: NormalizationMode,
    /// Append embedded resources to the normalised text.
    pub include_resources: bool,
    /// Consult `exists` before `insert`. The store stays authoritative either way.
    pub precheck: bool,
    /// File extensions (lowercase, no dot) picked up when walking directories.
    /// Empty means every file.
    pub extensions: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            mode: NormalizationMode::default(),
            include_resources: false,
            precheck: true,
            extensions: Vec::new(),
        }
    }
}

/// Counts over a batch of documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Documents attempted.
    pub total: usize,
    /// Newly stored.
    pub stored: usize,
    /// Already present.
    pub duplicates: usize,
    /// Failed with an error.
    pub failed: usize,
    /// Content-only requests that fell back to raw bytes.
    pub fallbacks: usize,
    /// Sum of document sizes that were processed successfully.
    pub total_bytes: u64,
}

impl BatchSummary {
    fn record(&mut self, result: &ProcessResult) {
        self.total += 1;
        self.total_bytes += result.size_bytes;
        if result.stored {
            self.stored += 1;
        } else {
            self.duplicates += 1;
        }
        if result.used_fallback() {
            self.fallbacks += 1;
        }
    }

    const fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }
}

/// Results of [`FingerprintService::process_paths`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Successful results in path order.
    pub results: Vec<ProcessResult>,
    /// Paths that failed and why.
    pub failures: Vec<(PathBuf, Error)>,
    /// Aggregate counts.
    pub summary: BatchSummary,
}

/// Visited states for one document, with transition checking.
#[derive(Debug)]
struct StateTrace {
    current: PipelineState,
    visited: Vec<PipelineState>,
}

impl StateTrace {
    fn new() -> Self {
        Self {
            current: PipelineState::Pending,
            visited: vec![PipelineState::Pending],
        }
    }

    fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(Error::OperationFailed {
                operation: "pipeline_transition".to_string(),
                cause: format!("illegal transition {} -> {}", self.current, next),
            });
        }
        tracing::trace!(from = %self.current, to = %next, "Pipeline transition");
        self.current = next;
        self.visited.push(next);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<PipelineState>> {
        self.advance(PipelineState::Done)?;
        Ok(self.visited)
    }
}

/// Fingerprint of a document before any store is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    /// Lowercase hex digest.
    pub fingerprint: String,
    /// Algorithm used.
    pub algorithm: HashAlgorithm,
    /// True if the digest covers normalised content only.
    pub content_only: bool,
    /// Size of the original document.
    pub size_bytes: u64,
    /// Page count reported by the extractor.
    pub page_count: Option<usize>,
    /// Why content extraction was abandoned, when the fallback ran.
    pub fallback_reason: Option<String>,
}

/// Extraction, normalisation and hashing without storage.
#[derive(Debug, Clone)]
pub struct Fingerprinter<X> {
    extractor: X,
    normalizer: ContentNormalizer,
    algorithm: HashAlgorithm,
    mode: NormalizationMode,
}

impl<X: TextExtractor> Fingerprinter<X> {
    /// Creates a fingerprinter from pipeline options.
    #[must_use]
    pub const fn new(extractor: X, options: &PipelineOptions) -> Self {
        Self {
            extractor,
            normalizer: ContentNormalizer::new().with_resources(options.include_resources),
            algorithm: options.algorithm,
            mode: options.mode,
        }
    }

    /// Fingerprints a document.
    ///
    /// In content-only mode an extraction failure is not an error: the raw
    /// bytes are hashed instead and the result is marked
    /// `content_only = false` with the failure recorded in `fallback_reason`.
    ///
    /// # Errors
    ///
    /// Returns an error only for illegal state transitions.
    pub fn fingerprint(&self, source_name: &str, raw: &[u8]) -> Result<DocumentFingerprint> {
        let mut trace = StateTrace::new();
        self.fingerprint_traced(&mut trace, source_name, raw)
    }

    fn fingerprint_traced(
        &self,
        trace: &mut StateTrace,
        source_name: &str,
        raw: &[u8],
    ) -> Result<DocumentFingerprint> {
        let mut page_count = None;
        let mut fallback_reason = None;

        let payload: Cow<'_, [u8]> = match self.mode {
            NormalizationMode::Raw => Cow::Borrowed(raw),
            NormalizationMode::ContentOnly => {
                trace.advance(PipelineState::Extracting)?;
                match self
                    .normalizer
                    .normalize_document(&self.extractor, source_name, raw)
                {
                    Ok((bytes, pages)) => {
                        trace.advance(PipelineState::Normalizing)?;
                        page_count = Some(pages);
                        Cow::Owned(bytes)
                    },
                    Err(e) => {
                        trace.advance(PipelineState::ExtractionFailed)?;
                        tracing::warn!(
                            source_name,
                            extractor = self.extractor.name(),
                            error = %e,
                            "Content extraction failed, fingerprinting raw bytes"
                        );
                        metrics::counter!(
                            "fingerprint_extraction_fallback_total",
                            "extractor" => self.extractor.name()
                        )
                        .increment(1);
                        fallback_reason = Some(e.to_string());
                        Cow::Borrowed(raw)
                    },
                }
            },
        };

        trace.advance(PipelineState::Fingerprinting)?;
        let fingerprint = FingerprintEngine::digest(&payload, self.algorithm);
        let content_only =
            matches!(self.mode, NormalizationMode::ContentOnly) && fallback_reason.is_none();

        Ok(DocumentFingerprint {
            fingerprint,
            algorithm: self.algorithm,
            content_only,
            size_bytes: raw.len() as u64,
            page_count,
            fallback_reason,
        })
    }

    /// Returns the configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Returns the configured mode.
    #[must_use]
    pub const fn mode(&self) -> NormalizationMode {
        self.mode
    }
}

/// The document pipeline.
///
/// One instance may be shared across threads; every call is independent and
/// the store is the only shared mutable resource.
///
/// # Example
///
/// ```rust,ignore
/// use docprint::{FingerprintService, PipelineOptions};
/// use docprint::extraction::PlainTextExtractor;
/// use docprint::storage::SqliteFingerprintStore;
///
/// let service = FingerprintService::new(
///     SqliteFingerprintStore::in_memory()?,
///     PlainTextExtractor::new(),
///     PipelineOptions::default(),
/// );
/// let result = service.process("a.txt", "in/a.txt", b"Hello World")?;
/// assert!(result.stored);
/// ```
pub struct FingerprintService<S, X> {
    store: S,
    fingerprinter: Fingerprinter<X>,
    options: PipelineOptions,
}

impl<S: FingerprintStore, X: TextExtractor> FingerprintService<S, X> {
    /// Creates a new service.
    #[must_use]
    pub const fn new(store: S, extractor: X, options: PipelineOptions) -> Self {
        let fingerprinter = Fingerprinter::new(extractor, &options);
        Self {
            store,
            fingerprinter,
            options,
        }
    }

    /// Returns the store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fingerprints a document without consulting the store.
    ///
    /// # Errors
    ///
    /// See [`Fingerprinter::fingerprint`].
    pub fn fingerprint(&self, source_name: &str, raw: &[u8]) -> Result<DocumentFingerprint> {
        self.fingerprinter.fingerprint(source_name, raw)
    }

    /// Runs one document through the full pipeline.
    ///
    /// A duplicate is reported as `stored = false` with the existing record in
    /// `conflicting_record`; it is not an error.
    ///
    /// # Errors
    ///
    /// Store failures (`ConnectionFailed`, `AmbiguousWrite`, `OperationFailed`)
    /// are propagated unchanged.
    #[instrument(skip(self, raw), fields(size = raw.len(), algorithm = %self.options.algorithm))]
    pub fn process(
        &self,
        source_name: &str,
        source_path: &str,
        raw: &[u8],
    ) -> Result<ProcessResult> {
        let start = Instant::now();
        let mut trace = StateTrace::new();
        let doc = self.fingerprinter.fingerprint_traced(&mut trace, source_name, raw)?;

        trace.advance(PipelineState::Checking)?;

        let existing = if self.options.precheck {
            self.store.exists(&doc.fingerprint, doc.algorithm)?
        } else {
            None
        };

        let (stored, record, conflicting) = if let Some(existing) = existing {
            (false, None, Some(existing))
        } else {
            let candidate = NewFingerprint {
                source_name: source_name.to_string(),
                source_path: source_path.to_string(),
                fingerprint: doc.fingerprint.clone(),
                size_bytes: doc.size_bytes,
                algorithm: doc.algorithm,
                content_only: doc.content_only,
            };
            let outcome = self.store.insert(&candidate)?;
            (outcome.stored, outcome.record, outcome.conflicting_record)
        };

        if stored {
            trace.advance(PipelineState::Stored)?;
        } else {
            trace.advance(PipelineState::Duplicate)?;
        }

        let result = build_result(source_name, doc, start, stored, record, conflicting, trace)?;
        log_outcome(&result);
        Ok(result)
    }

    /// Fingerprints a document and looks it up without storing.
    ///
    /// `stored` is always false; `conflicting_record` holds the existing
    /// record if the content is already known.
    ///
    /// # Errors
    ///
    /// Store lookup failures are propagated.
    #[instrument(skip(self, raw), fields(size = raw.len()))]
    pub fn check(&self, source_name: &str, raw: &[u8]) -> Result<ProcessResult> {
        let start = Instant::now();
        let mut trace = StateTrace::new();
        let doc = self.fingerprinter.fingerprint_traced(&mut trace, source_name, raw)?;
        trace.advance(PipelineState::Checking)?;
        let existing = self.store.exists(&doc.fingerprint, doc.algorithm)?;
        build_result(source_name, doc, start, false, None, existing, trace)
    }

    /// Reads and processes one file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be read, plus any
    /// error from [`FingerprintService::process`].
    pub fn process_file(&self, path: &Path) -> Result<ProcessResult> {
        let raw = std::fs::read(path).map_err(|e| Error::OperationFailed {
            operation: "read_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let source_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        self.process(&source_name, &path.display().to_string(), &raw)
    }

    /// Processes files and directories (walked recursively).
    ///
    /// Each document is independent: a failure is recorded and the batch
    /// continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if a directory cannot be listed.
    pub fn process_paths(&self, paths: &[PathBuf]) -> Result<BatchReport> {
        let files = collect_files(paths, &self.options.extensions)?;
        let mut report = BatchReport::default();
        for file in files {
            match self.process_file(&file) {
                Ok(result) => {
                    report.summary.record(&result);
                    report.results.push(result);
                },
                Err(e) => {
                    tracing::error!(
                        path = %file.display(),
                        error = %e,
                        "Failed to process document"
                    );
                    report.summary.record_failure();
                    report.failures.push((file, e));
                },
            }
        }
        tracing::info!(
            total = report.summary.total,
            stored = report.summary.stored,
            duplicates = report.summary.duplicates,
            failed = report.summary.failed,
            "Batch complete"
        );
        Ok(report)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_result(
    source_name: &str,
    doc: DocumentFingerprint,
    start: Instant,
    stored: bool,
    record: Option<FingerprintRecord>,
    conflicting_record: Option<FingerprintRecord>,
    trace: StateTrace,
) -> Result<ProcessResult> {
    Ok(ProcessResult {
        source_name: source_name.to_string(),
        fingerprint: doc.fingerprint,
        algorithm: doc.algorithm,
        content_only: doc.content_only,
        size_bytes: doc.size_bytes,
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        stored,
        record_id: record.map(|r| r.id),
        conflicting_record,
        page_count: doc.page_count,
        fallback_reason: doc.fallback_reason,
        trace: trace.finish()?,
    })
}

fn log_outcome(result: &ProcessResult) {
    let prefix = &result.fingerprint[..result.fingerprint.len().min(16)];
    if result.stored {
        tracing::info!(
            source_name = %result.source_name,
            fingerprint = prefix,
            algorithm = %result.algorithm,
            content_only = result.content_only,
            record_id = ?result.record_id,
            "Stored new fingerprint"
        );
    } else if let Some(existing) = &result.conflicting_record {
        tracing::info!(
            source_name = %result.source_name,
            fingerprint = prefix,
            algorithm = %result.algorithm,
            existing_id = %existing.id,
            existing_source = %existing.source_name,
            "Duplicate content"
        );
        metrics::counter!(
            "fingerprint_duplicates_total",
            "algorithm" => result.algorithm.as_str()
        )
        .increment(1);
    }
}

/// Expands directories into their files, sorted for a stable order.
fn collect_files(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            walk_dir(path, extensions, &mut found)?;
            found.sort();
            out.extend(found);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn walk_dir(dir: &Path, extensions: &[String], out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::OperationFailed {
        operation: "read_dir".to_string(),
        cause: format!("{}: {e}", dir.display()),
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::OperationFailed {
            operation: "read_dir_entry".to_string(),
            cause: e.to_string(),
        })?;
        let path = entry.path();
        // file_type() does not follow symlinks
        let file_type = entry.file_type().map_err(|e| Error::OperationFailed {
            operation: "read_dir_entry".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        if file_type.is_dir() {
            walk_dir(&path, extensions, out)?;
        } else if file_type.is_symlink() && path.is_dir() {
            tracing::debug!(path = %path.display(), "Skipping symlinked directory");
        } else if matches_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{ExtractedDocument, PlainTextExtractor};
    use crate::storage::SqliteFingerprintStore;

    fn service(
        options: PipelineOptions,
    ) -> FingerprintService<SqliteFingerprintStore, PlainTextExtractor> {
        FingerprintService::new(
            SqliteFingerprintStore::in_memory().unwrap(),
            PlainTextExtractor::new(),
            options,
        )
    }

    /// Extractor that pretends every document carries an image.
    struct WithImage;

    impl TextExtractor for WithImage {
        fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
            Ok(
                ExtractedDocument::from_text(1, String::from_utf8_lossy(bytes))
                    .with_resource(vec![9, 9]),
            )
        }

        fn name(&self) -> &'static str {
            "with_image"
        }
    }

    #[test]
    fn test_store_then_duplicate() {
        let service = service(PipelineOptions::default());
        let first = service.process("a.txt", "in/a.txt", b"Hello World").unwrap();
        assert!(first.stored);
        assert!(first.content_only);
        assert!(first.record_id.is_some());
        assert_eq!(first.fingerprint.len(), 128);

        let second = service.process("b.txt", "in/b.txt", b"  Hello\r\n World\n").unwrap();
        assert!(!second.stored);
        assert_eq!(second.fingerprint, first.fingerprint);
        let conflict = second.conflicting_record.unwrap();
        assert_eq!(Some(conflict.id), first.record_id);
        assert_eq!(conflict.source_name, "a.txt");
    }

    #[test]
    fn test_duplicate_without_precheck() {
        let service = service(PipelineOptions {
            precheck: false,
            ..PipelineOptions::default()
        });
        let first = service.process("a", "a", b"same").unwrap();
        let second = service.process("b", "b", b"same").unwrap();
        assert!(first.stored);
        assert!(!second.stored);
        assert_eq!(second.conflicting_record.map(|r| r.id), first.record_id);
    }

    #[test]
    fn test_content_trace() {
        let result = service(PipelineOptions::default())
            .process("a", "a", b"text")
            .unwrap();
        assert_eq!(
            result.trace,
            vec![
                PipelineState::Pending,
                PipelineState::Extracting,
                PipelineState::Normalizing,
                PipelineState::Fingerprinting,
                PipelineState::Checking,
                PipelineState::Stored,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn test_extraction_failure_falls_back_to_raw() {
        let raw = b"%PDF-1.7\n\xff\xfe\x00binary";
        let result = service(PipelineOptions::default())
            .process("scan.pdf", "in/scan.pdf", raw)
            .unwrap();
        assert!(result.stored);
        assert!(!result.content_only);
        assert!(result.used_fallback());
        assert_eq!(result.fingerprint, FingerprintEngine::digest(raw, HashAlgorithm::Blake2b512));
        assert!(result.trace.contains(&PipelineState::ExtractionFailed));
        assert!(!result.trace.contains(&PipelineState::Normalizing));
    }

    #[test]
    fn test_raw_mode_skips_extraction() {
        let service = service(PipelineOptions {
            mode: NormalizationMode::Raw,
            ..PipelineOptions::default()
        });
        let a = service.process("a", "a", b"Hello World").unwrap();
        let b = service.process("b", "b", b"Hello  World").unwrap();
        assert!(!a.content_only);
        assert!(a.fallback_reason.is_none());
        assert!(a.page_count.is_none());
        assert!(b.stored, "raw mode is whitespace-sensitive");
        assert_eq!(a.trace[1], PipelineState::Fingerprinting);
    }

    #[test]
    fn test_empty_document() {
        let service = service(PipelineOptions::default());
        let a = service.process("empty", "empty", b"").unwrap();
        let b = service.process("blank", "blank", b" \n\t ").unwrap();
        assert!(a.stored);
        assert!(a.content_only);
        assert!(!b.stored);
        assert_eq!(a.fingerprint, FingerprintEngine::digest(b"", HashAlgorithm::Blake2b512));
    }

    #[test]
    fn test_algorithms_do_not_collide() {
        let store = SqliteFingerprintStore::in_memory().unwrap();
        let blake =
            FingerprintService::new(&store, PlainTextExtractor::new(), PipelineOptions::default());
        let sha = FingerprintService::new(
            &store,
            PlainTextExtractor::new(),
            PipelineOptions {
                algorithm: HashAlgorithm::Sha512,
                ..PipelineOptions::default()
            },
        );
        assert!(blake.process("a", "a", b"doc").unwrap().stored);
        assert!(sha.process("a", "a", b"doc").unwrap().stored);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_check_never_writes() {
        let service = service(PipelineOptions::default());
        let unknown = service.check("a", b"new content").unwrap();
        assert!(!unknown.stored);
        assert!(unknown.conflicting_record.is_none());
        assert_eq!(service.store().count().unwrap(), 0);

        service.process("a", "a", b"new content").unwrap();
        let known = service.check("b", b"new   content").unwrap();
        assert!(known.is_duplicate());
        assert_eq!(service.store().count().unwrap(), 1);
    }

    #[test]
    fn test_resources_change_fingerprint() {
        let plain = FingerprintService::new(
            SqliteFingerprintStore::in_memory().unwrap(),
            WithImage,
            PipelineOptions::default(),
        );
        let with_resources = FingerprintService::new(
            SqliteFingerprintStore::in_memory().unwrap(),
            WithImage,
            PipelineOptions {
                include_resources: true,
                ..PipelineOptions::default()
            },
        );
        let a = plain.fingerprint("a", b"text").unwrap();
        let b = with_resources.fingerprint("a", b"text").unwrap();
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint, FingerprintEngine::digest(b"text", HashAlgorithm::Blake2b512));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut trace = StateTrace::new();
        let err = trace.advance(PipelineState::Stored).unwrap_err();
        assert!(matches!(
            err,
            Error::OperationFailed { ref operation, .. } if operation == "pipeline_transition"
        ));
    }

    #[test]
    fn test_process_paths_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.txt"), "alpha beta").unwrap();
        std::fs::write(dir.path().join("two.txt"), "alpha\n\nbeta").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("three.txt"), "gamma").unwrap();
        std::fs::write(dir.path().join("skip.bin"), [0u8, 1, 2]).unwrap();

        let service = service(PipelineOptions {
            extensions: vec!["txt".to_string()],
            ..PipelineOptions::default()
        });
        let report = service
            .process_paths(&[dir.path().to_path_buf(), dir.path().join("missing.txt")])
            .unwrap();

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.stored, 2);
        assert_eq!(report.summary.duplicates, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.failures.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_paths_skips_symlinked_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "only file").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link.txt")).unwrap();

        let report = service(PipelineOptions::default())
            .process_paths(&[dir.path().to_path_buf()])
            .unwrap();

        // a.txt plus the file symlink; the directory loop is not followed
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.stored, 1);
        assert_eq!(report.summary.duplicates, 1);
        assert_eq!(report.summary.failed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_paths_self_loop_counts_one_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "only file").unwrap();
        std::os::unix::fs::symlink(".", dir.path().join("loop")).unwrap();

        let report = service(PipelineOptions::default())
            .process_paths(&[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.stored, 1);
        assert_eq!(report.summary.failed, 0);
    }
}
