//! Plain-text extractor.

use super::{ExtractedDocument, TextExtractor};
use crate::{Error, Result};

/// Form feed, the conventional page separator in plain-text dumps.
const PAGE_BREAK: char = '\u{000C}';

/// Extracts UTF-8 text documents.
///
/// Pages are separated by form feeds. A leading byte-order mark is dropped.
/// Invalid UTF-8 is rejected unless the extractor is built with
/// [`PlainTextExtractor::lossy`], in which case it is replaced with U+FFFD.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor {
    lossy: bool,
}

impl PlainTextExtractor {
    /// Creates a strict extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self { lossy: false }
    }

    /// Creates an extractor that replaces invalid UTF-8 instead of failing.
    #[must_use]
    pub const fn lossy() -> Self {
        Self { lossy: true }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        if self.lossy {
            return Ok(String::from_utf8_lossy(bytes).into_owned());
        }
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| Error::UnparseableDocument {
                reason: format!("invalid UTF-8 at byte {}", e.valid_up_to()),
            })
    }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = self.decode(bytes)?;
        let page_count = if text.is_empty() {
            0
        } else {
            text.split(PAGE_BREAK).count()
        };
        Ok(ExtractedDocument::from_text(page_count, text))
    }

    fn name(&self) -> &'static str {
        "plain_text"
    }
}
