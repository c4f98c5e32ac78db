//! Bounded text extraction from PDF documents.

use tracing::debug;

use crate::pdf::{PdfDocument, PdfError};

/// Number of pages read when nothing else is configured.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Raw per-page text of the first pages of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Text of each page that was read, in page order.
    pub pages: Vec<String>,
    /// Page count of the whole document.
    pub total_pages: usize,
}

impl ExtractedText {
    /// All pages joined back to back. Page boundaries are not marked.
    pub fn concatenated(&self) -> String {
        self.pages.concat()
    }

    /// Whether pages past the limit were skipped.
    pub fn is_truncated(&self) -> bool {
        self.pages.len() < self.total_pages
    }
}

/// Reads text from at most `page_limit` pages of a PDF.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    page_limit: usize,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl TextExtractor {
    pub fn new(page_limit: usize) -> Self {
        Self { page_limit }
    }

    /// Open `bytes` as a PDF and read its first pages.
    ///
    /// Fails only when the bytes are not a PDF; pages whose content can't be
    /// decoded contribute empty text. The document is dropped before returning.
    pub fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, PdfError> {
        let doc = PdfDocument::open(bytes)?;
        let total_pages = doc.page_count();
        let to_read = total_pages.min(self.page_limit);

        let pages: Vec<String> = (0..to_read).map(|i| doc.layout_lossy(i).text()).collect();

        debug!(
            "Extracted {} chars from {}/{} pages",
            pages.iter().map(|p| p.chars().count()).sum::<usize>(),
            to_read,
            total_pages
        );
        Ok(ExtractedText { pages, total_pages })
    }
}
