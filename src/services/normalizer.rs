//! Content normalisation.
//!
//! Produces the canonical byte sequence that the fingerprint engine hashes.
//! Two documents with the same semantic text normalise to the same bytes
//! regardless of line endings, indentation or the extracting tool's spacing.

use crate::extraction::{ExtractedDocument, TextExtractor};
use crate::{Error, Result};

/// Normaliser for extracted document content.
///
/// # Normalisation
///
/// - Every run of Unicode whitespace (spaces, tabs, `\r\n`, `\n`, form feeds,
///   NBSP, ...) becomes a single ASCII space
/// - Leading and trailing whitespace is removed
/// - The text is encoded as UTF-8
/// - If resources are included, their raw bytes follow the text in document order
///
/// Case is preserved: `"Hello"` and `"hello"` are different content.
///
/// # Example
///
/// ```rust
/// use docprint::ContentNormalizer;
///
/// assert_eq!(ContentNormalizer::normalize_text("  Hello \r\n\t World  "), "Hello World");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentNormalizer {
    include_resources: bool,
}

impl ContentNormalizer {
    /// Creates a text-only normaliser.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            include_resources: false,
        }
    }

    /// Sets whether embedded resources are appended after the text.
    #[must_use]
    pub const fn with_resources(mut self, include: bool) -> Self {
        self.include_resources = include;
        self
    }

    /// Returns true if resources are appended.
    #[must_use]
    pub const fn includes_resources(&self) -> bool {
        self.include_resources
    }

    /// Collapses whitespace runs and trims.
    ///
    /// Idempotent: `normalize_text(normalize_text(x)) == normalize_text(x)`.
    #[must_use]
    pub fn normalize_text(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
        out
    }

    /// Builds the canonical byte sequence for an extracted document.
    #[must_use]
    pub fn normalize(&self, document: &ExtractedDocument) -> Vec<u8> {
        let mut bytes = Self::normalize_text(&document.text).into_bytes();
        if self.include_resources {
            let extra: usize = document.resources.iter().map(Vec::len).sum();
            bytes.reserve(extra);
            for resource in &document.resources {
                bytes.extend_from_slice(resource);
            }
        }
        bytes
    }

    /// Extracts and normalises raw document bytes.
    ///
    /// Returns the canonical bytes and the extractor's page count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExtractionFailed`] if the extractor fails for any reason.
    pub fn normalize_document<X>(
        &self,
        extractor: &X,
        source_name: &str,
        raw: &[u8],
    ) -> Result<(Vec<u8>, usize)>
    where
        X: TextExtractor + ?Sized,
    {
        let document = extractor
            .extract(raw)
            .map_err(|e| Error::ExtractionFailed {
                source_name: source_name.to_string(),
                cause: match e {
                    Error::UnparseableDocument { reason } => reason,
                    other => other.to_string(),
                },
            })?;
        Ok((self.normalize(&document), document.page_count))
    }
}
