//! Text extraction seam.
//!
//! Document parsing is an external capability. The pipeline only needs a
//! page count, a concatenated text stream, and optionally the embedded binary
//! resources in document order. Anything that can produce those implements
//! [`TextExtractor`].

mod plain;

pub use plain::PlainTextExtractor;

use crate::Result;

/// Output of a text extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Number of pages the extractor saw.
    pub page_count: usize,
    /// Concatenated text of all pages.
    pub text: String,
    /// Embedded binary resources (images, fonts, ...) in document order.
    pub resources: Vec<Vec<u8>>,
}

impl ExtractedDocument {
    /// Creates a text-only document.
    #[must_use]
    pub fn from_text(page_count: usize, text: impl Into<String>) -> Self {
        Self {
            page_count,
            text: text.into(),
            resources: Vec::new(),
        }
    }

    /// Adds a resource after the existing ones.
    #[must_use]
    pub fn with_resource(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.push(bytes.into());
        self
    }
}

/// Extracts text from raw document bytes.
///
/// Implementations must be deterministic: the same bytes always yield the
/// same text and resources in the same order.
pub trait TextExtractor: Send + Sync {
    /// Extracts the document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnparseableDocument`] when the bytes cannot be
    /// interpreted.
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

impl<T: TextExtractor + ?Sized> TextExtractor for Box<T> {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        (**self).extract(bytes)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: TextExtractor + ?Sized> TextExtractor for std::sync::Arc<T> {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        (**self).extract(bytes)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
