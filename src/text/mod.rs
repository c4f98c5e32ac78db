//! Text extraction from PDFs and cleanup before prompting.

mod extractor;
mod normalize;

pub use extractor::{ExtractedText, TextExtractor, DEFAULT_PAGE_LIMIT};
pub use normalize::normalize;
