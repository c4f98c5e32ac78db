//! Keyword-driven signature placement.
//!
//! Sign-off phrases such as "Hormat Kami" usually sit just below the space left
//! for a signature. For every occurrence of a keyword we propose a fixed-size box
//! directly above it.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

use crate::pdf::{PdfDocument, PdfError, Rect};

pub const SIGNATURE_WIDTH: f64 = 120.0;
pub const SIGNATURE_HEIGHT: f64 = 60.0;
/// Gap between the bottom of the proposed box and the top of the keyword.
pub const VERTICAL_OFFSET: f64 = 10.0;

/// Keywords searched when the caller supplies none.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "Hormat Kami",
    "Hormat Saya",
    "Disetujui Oleh",
    "Diketahui Oleh",
    "Dibuat Oleh",
    "Tanda Tangan",
    "Pihak Pertama",
    "Pihak Kedua",
    "Yours sincerely",
    "Sincerely",
    "Approved by",
    "Signed by",
    "Signature",
];

/// Axis-aligned box in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for BoxRect {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
        }
    }
}

/// A proposed signature area next to one keyword occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatch {
    /// 1-based
    pub page_number: usize,
    pub keyword: String,
    pub signature_box: BoxRect,
    pub matched_text_box: BoxRect,
}

impl SignatureMatch {
    fn above(page_number: usize, keyword: &str, text: Rect) -> Self {
        Self {
            page_number,
            keyword: keyword.to_string(),
            signature_box: BoxRect {
                x: text.x0,
                y: (text.y0 - SIGNATURE_HEIGHT - VERTICAL_OFFSET).max(0.0),
                width: SIGNATURE_WIDTH,
                height: SIGNATURE_HEIGHT,
            },
            matched_text_box: text.into(),
        }
    }
}

struct Coordinates<'a>(&'a BoxRect);

impl Serialize for Coordinates<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Coordinates", 4)?;
        s.serialize_field("x", &self.0.x)?;
        s.serialize_field("y", &self.0.y)?;
        s.serialize_field("width", &self.0.width)?;
        s.serialize_field("height", &self.0.height)?;
        s.end()
    }
}

/// The matched text rectangle uses short `w`/`h` keys on the wire.
struct TextRect<'a>(&'a BoxRect);

impl Serialize for TextRect<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("TextRect", 4)?;
        s.serialize_field("x", &self.0.x)?;
        s.serialize_field("y", &self.0.y)?;
        s.serialize_field("w", &self.0.width)?;
        s.serialize_field("h", &self.0.height)?;
        s.end()
    }
}

impl Serialize for SignatureMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("SignatureMatch", 4)?;
        s.serialize_field("page_number", &self.page_number)?;
        s.serialize_field("keyword_found", &self.keyword)?;
        s.serialize_field("coordinates", &Coordinates(&self.signature_box))?;
        s.serialize_field("context_text_rect", &TextRect(&self.matched_text_box))?;
        s.end()
    }
}

/// Finds keyword occurrences and proposes a signature box above each one.
#[derive(Debug, Clone)]
pub struct SignatureLocator {
    keywords: Vec<String>,
}

impl Default for SignatureLocator {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl SignatureLocator {
    /// Use `keywords`, or [`DEFAULT_KEYWORDS`] when none are non-blank.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            keywords = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        }
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Matches in page order, then keyword order, then position on the page.
    ///
    /// Pages whose content can't be decoded are skipped.
    pub fn locate(&self, doc: &PdfDocument) -> Vec<SignatureMatch> {
        let mut matches = Vec::new();
        for index in 0..doc.page_count() {
            let layout = doc.layout_lossy(index);
            for keyword in &self.keywords {
                for rect in layout.search(keyword) {
                    matches.push(SignatureMatch::above(index + 1, keyword, rect));
                }
            }
        }
        debug!(
            "Found {} signature candidates on {} pages",
            matches.len(),
            doc.page_count()
        );
        matches
    }

    /// Open `bytes` as a PDF and locate signature boxes in it.
    pub fn locate_bytes(&self, bytes: &[u8]) -> Result<Vec<SignatureMatch>, PdfError> {
        let doc = PdfDocument::open(bytes)?;
        Ok(self.locate(&doc))
    }
}
