//! End-to-end tests over a file-backed `SQLite` store.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use docprint::extraction::{ExtractedDocument, PlainTextExtractor, TextExtractor};
use docprint::{
    Error, FingerprintService, FingerprintStore, HashAlgorithm, NormalizationMode, PipelineOptions,
    PipelineState, SqliteFingerprintStore,
};
use std::fs;
use tempfile::TempDir;

fn service_at(
    dir: &TempDir,
    options: PipelineOptions,
) -> FingerprintService<SqliteFingerprintStore, PlainTextExtractor> {
    let store = SqliteFingerprintStore::new(dir.path().join("fingerprints.db")).unwrap();
    FingerprintService::new(store, PlainTextExtractor::new(), options)
}

/// Extractor that ignores a leading metadata line, like a PDF info dictionary.
struct SkipsHeader;

impl TextExtractor for SkipsHeader {
    fn extract(&self, bytes: &[u8]) -> docprint::Result<ExtractedDocument> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::UnparseableDocument {
            reason: e.to_string(),
        })?;
        let body = text.split_once('\n').map_or("", |(_, body)| body);
        Ok(ExtractedDocument::from_text(1, body))
    }

    fn name(&self) -> &'static str {
        "skips_header"
    }
}

#[test]
fn test_hello_world_stored_then_duplicate() {
    let dir = TempDir::new().unwrap();
    let service = service_at(&dir, PipelineOptions::default());

    let first = service.process("a.pdf", "in/a.pdf", b"Hello World").unwrap();
    assert!(first.stored);
    assert!(first.content_only);
    assert_eq!(first.fingerprint.len(), 128);
    let id = first.record_id.unwrap();

    let second = service
        .process("b.pdf", "in/b.pdf", b"  Hello \r\n\r\n World\n")
        .unwrap();
    assert!(!second.stored);
    assert_eq!(second.fingerprint, first.fingerprint);
    let existing = second.conflicting_record.unwrap();
    assert_eq!(existing.id, id);
    assert_eq!(existing.source_name, "a.pdf");
    assert_eq!(service.store().count().unwrap(), 1);
}

#[test]
fn test_metadata_differences_do_not_matter() {
    let dir = TempDir::new().unwrap();
    let store = SqliteFingerprintStore::new(dir.path().join("fp.db")).unwrap();
    let service = FingerprintService::new(store, SkipsHeader, PipelineOptions::default());

    let a = service
        .process("a", "a", b"Author: Alice, 2021\nQuarterly report")
        .unwrap();
    let b = service
        .process("b", "b", b"Author: Bob, 2024\nQuarterly   report")
        .unwrap();
    assert!(a.stored);
    assert!(!b.stored);
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn test_raw_mode_distinguishes_whitespace() {
    let dir = TempDir::new().unwrap();
    let options = PipelineOptions {
        mode: NormalizationMode::Raw,
        ..PipelineOptions::default()
    };
    let service = service_at(&dir, options);

    let a = service.process("a", "a", b"Hello World").unwrap();
    let b = service.process("b", "b", b"Hello  World").unwrap();
    assert!(a.stored);
    assert!(b.stored);
    assert!(!a.content_only);
    assert_eq!(
        a.trace,
        vec![
            PipelineState::Pending,
            PipelineState::Fingerprinting,
            PipelineState::Checking,
            PipelineState::Stored,
            PipelineState::Done,
        ]
    );
}

#[test]
fn test_unparseable_document_falls_back_to_raw_bytes() {
    let dir = TempDir::new().unwrap();
    let service = service_at(&dir, PipelineOptions::default());
    let garbage = [0xff_u8, 0xfe, 0x00, 0x9c];

    let result = service.process("broken.pdf", "in/broken.pdf", &garbage).unwrap();
    assert!(result.stored);
    assert!(!result.content_only);
    assert!(result.used_fallback());
    assert_eq!(
        result.fingerprint,
        docprint::FingerprintEngine::digest(&garbage, HashAlgorithm::Blake2b512)
    );
    assert!(result.trace.contains(&PipelineState::ExtractionFailed));

    let stored = service.store().get(result.record_id.unwrap()).unwrap().unwrap();
    assert!(!stored.content_only);
}

#[test]
fn test_algorithms_are_independent_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fp.db");
    for algorithm in HashAlgorithm::all() {
        let store = SqliteFingerprintStore::new(&path).unwrap();
        let options = PipelineOptions {
            algorithm: *algorithm,
            ..PipelineOptions::default()
        };
        let service = FingerprintService::new(store, PlainTextExtractor::new(), options);
        assert!(service.process("doc", "doc", b"same bytes").unwrap().stored);
        assert!(!service.process("doc", "doc", b"same bytes").unwrap().stored);
    }
    let store = SqliteFingerprintStore::new(&path).unwrap();
    assert_eq!(store.count().unwrap(), HashAlgorithm::all().len());
}

#[test]
fn test_check_never_writes() {
    let dir = TempDir::new().unwrap();
    let service = service_at(&dir, PipelineOptions::default());

    let unknown = service.check("x", b"fresh content").unwrap();
    assert!(!unknown.stored);
    assert!(unknown.conflicting_record.is_none());
    assert_eq!(service.store().count().unwrap(), 0);

    service.process("x", "x", b"fresh content").unwrap();
    let known = service.check("y", b"fresh   content").unwrap();
    assert!(known.is_duplicate());
    assert_eq!(service.store().count().unwrap(), 1);
}

#[test]
fn test_without_precheck_store_still_decides() {
    let dir = TempDir::new().unwrap();
    let options = PipelineOptions {
        precheck: false,
        ..PipelineOptions::default()
    };
    let service = service_at(&dir, options);
    assert!(service.process("a", "a", b"doc").unwrap().stored);
    let again = service.process("b", "b", b"doc").unwrap();
    assert!(!again.stored);
    assert!(again.conflicting_record.is_some());
}

#[test]
fn test_batch_directory_walk() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir_all(docs.join("nested")).unwrap();
    fs::write(docs.join("a.txt"), "Resume of Jane Doe").unwrap();
    fs::write(docs.join("b.txt"), "Resume  of\nJane Doe").unwrap();
    fs::write(docs.join("nested").join("c.txt"), "Another person").unwrap();
    fs::write(docs.join("skip.bin"), [0u8, 1, 2]).unwrap();

    let options = PipelineOptions {
        extensions: vec!["txt".to_string()],
        ..PipelineOptions::default()
    };
    let service = service_at(&dir, options);
    let report = service
        .process_paths(&[docs.clone(), dir.path().join("missing.txt")])
        .unwrap();

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.stored, 2);
    assert_eq!(report.summary.duplicates, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.results[0].source_name, "a.txt");
    assert!(!report.results[1].stored);
}

#[test]
fn test_reopened_store_sees_previous_records() {
    let dir = TempDir::new().unwrap();
    {
        let service = service_at(&dir, PipelineOptions::default());
        assert!(service.process("a", "a", b"persisted").unwrap().stored);
    }
    let service = service_at(&dir, PipelineOptions::default());
    let result = service.process("b", "b", b"persisted").unwrap();
    assert!(!result.stored);
    assert!(result.conflicting_record.unwrap().created_at > 0);
}
