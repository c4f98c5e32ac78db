//! PDF access: open a byte buffer, read per-page text, search for text and get
//! match rectangles.
//!
//! Built on lopdf. Positions come from a small content stream interpreter
//! ([`content::Interpreter`]) and are reported in a top-left origin coordinate
//! space, in points, relative to the page's MediaBox.

mod content;
mod fonts;
mod geometry;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;
use tracing::warn;

pub use content::{Glyph, TextLine};
pub use geometry::Rect;

use content::{group_lines, Interpreter, PageFrame};
use fonts::load_fonts;

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Errors from the PDF layer.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Not a readable PDF: {0}")]
    Parse(String),

    #[error("Page index {index} out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Failed to decode content of page {page}: {message}")]
    Content { page: usize, message: String },
}

/// Follow a reference to the object it points at. Dangling references resolve to themselves.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Numeric value of an Integer or Real object.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Decoded content of a (possibly referenced) stream object.
pub(crate) fn stream_bytes(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match resolve(doc, obj) {
        Object::Stream(stream) => Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

/// Text lines of one page plus its dimensions.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub lines: Vec<TextLine>,
}

impl PageLayout {
    /// Plain text of the page, one line per text line.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every non-overlapping occurrence of `needle` on the page.
    ///
    /// Matching ignores case, treats any whitespace run in `needle` as matching any
    /// whitespace run on the line, and never crosses a line boundary.
    pub fn search(&self, needle: &str) -> Vec<Rect> {
        let words: Vec<&str> = needle.split_whitespace().collect();
        let pattern = fold_chars(&words.join(" "));
        if pattern.is_empty() {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for line in &self.lines {
            // One entry per searchable char, remembering which glyph produced it.
            let mut chars: Vec<(char, usize)> = Vec::new();
            for (index, glyph) in line.glyphs.iter().enumerate() {
                for c in fold_chars(&glyph.text) {
                    if c.is_whitespace() {
                        if chars.last().map_or(true, |(prev, _)| *prev != ' ') {
                            chars.push((' ', index));
                        }
                    } else {
                        chars.push((c, index));
                    }
                }
            }

            let mut start = 0;
            while start + pattern.len() <= chars.len() {
                let window = &chars[start..start + pattern.len()];
                if window.iter().map(|(c, _)| *c).eq(pattern.iter().copied()) {
                    let first = window[0].1;
                    let last = window[window.len() - 1].1;
                    let rect = line.glyphs[first..=last]
                        .iter()
                        .map(|g| g.bbox)
                        .reduce(|acc, r| acc.union(&r));
                    if let Some(rect) = rect {
                        hits.push(rect);
                    }
                    start += pattern.len();
                } else {
                    start += 1;
                }
            }
        }
        hits
    }
}

/// Lowercase char by char, keeping a one-to-one mapping with the input.
fn fold_chars(s: &str) -> Vec<char> {
    s.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// An opened PDF document.
pub struct PdfDocument {
    inner: Document,
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Parse a PDF from memory.
    pub fn open(bytes: &[u8]) -> Result<Self, PdfError> {
        if bytes.is_empty() {
            return Err(PdfError::Parse("empty input".to_string()));
        }
        let inner = Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
        let page_ids = inner.get_pages().into_values().collect();
        Ok(Self { inner, page_ids })
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PdfError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(PdfError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    /// Look up a page attribute, walking up the page tree for inherited values.
    fn inherited<'a>(&'a self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let mut current = page;
        // Depth bound guards against cyclic Parent chains.
        for _ in 0..32 {
            if let Ok(value) = current.get(key) {
                return Some(resolve(&self.inner, value));
            }
            let parent = current.get(b"Parent").ok()?;
            match resolve(&self.inner, parent) {
                Object::Dictionary(dict) => current = dict,
                _ => return None,
            }
        }
        None
    }

    fn media_box(&self, page: &Dictionary) -> [f64; 4] {
        match self.inherited(page, b"MediaBox") {
            Some(Object::Array(values)) if values.len() == 4 => {
                let mut out = DEFAULT_MEDIA_BOX;
                for (slot, value) in out.iter_mut().zip(values) {
                    match number(resolve(&self.inner, value)) {
                        Some(n) => *slot = n,
                        None => return DEFAULT_MEDIA_BOX,
                    }
                }
                out
            }
            _ => DEFAULT_MEDIA_BOX,
        }
    }

    /// Lay out the text of the page at `index` (0-based).
    pub fn layout(&self, index: usize) -> Result<PageLayout, PdfError> {
        let page_id = self.page_id(index)?;
        let page = self
            .inner
            .get_dictionary(page_id)
            .map_err(|e| PdfError::Content {
                page: index,
                message: e.to_string(),
            })?;

        let [x0, y0, x1, y1] = self.media_box(page);
        let frame = PageFrame {
            left: x0.min(x1),
            top: y0.max(y1),
        };

        let data = self
            .inner
            .get_page_content(page_id)
            .map_err(|e| PdfError::Content {
                page: index,
                message: e.to_string(),
            })?;
        let content = Content::decode(&data).map_err(|e| PdfError::Content {
            page: index,
            message: e.to_string(),
        })?;

        let resources = match self.inherited(page, b"Resources") {
            Some(Object::Dictionary(resources)) => Some(resources),
            _ => None,
        };
        let fonts = resources
            .map(|r| load_fonts(&self.inner, r))
            .unwrap_or_default();
        let mut interpreter = Interpreter::new(&fonts, frame);
        if let Some(resources) = resources {
            interpreter = interpreter.with_resources(&self.inner, resources);
        }
        let glyphs = interpreter.run(&content.operations);

        Ok(PageLayout {
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
            lines: group_lines(glyphs),
        })
    }

    /// Layout of a page, or an empty one (logged) if its content can't be decoded.
    pub fn layout_lossy(&self, index: usize) -> PageLayout {
        match self.layout(index) {
            Ok(layout) => layout,
            Err(e) => {
                warn!("Skipping page {}: {}", index + 1, e);
                PageLayout {
                    width: 0.0,
                    height: 0.0,
                    lines: Vec::new(),
                }
            }
        }
    }

    /// Plain text of the page at `index`.
    pub fn page_text(&self, index: usize) -> Result<String, PdfError> {
        Ok(self.layout(index)?.text())
    }

    /// Match rectangles for `needle` on the page at `index`.
    pub fn search(&self, index: usize, needle: &str) -> Result<Vec<Rect>, PdfError> {
        Ok(self.layout(index)?.search(needle))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Builds small single-font PDFs for tests.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};

    /// A line of text drawn at `(x, y)` in PDF user space (bottom-left origin).
    pub struct TextItem<'a> {
        pub x: i64,
        pub y: i64,
        pub size: i64,
        pub text: &'a str,
    }

    pub fn item(x: i64, y: i64, text: &str) -> TextItem<'_> {
        TextItem {
            x,
            y,
            size: 12,
            text,
        }
    }

    /// Build a Letter-sized PDF with one entry per page.
    pub fn build_pdf(pages: &[Vec<TextItem<'_>>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::new();
        for items in pages {
            let mut operations = Vec::new();
            for item in items {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec!["F1".into(), Object::Integer(item.size)],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Integer(item.x), Object::Integer(item.y)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(
                        item.text.as_bytes().to_vec(),
                        StringFormat::Literal,
                    )],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save pdf");
        buffer
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{build_pdf, item};
    use super::*;
    use lopdf::{dictionary, Stream};

    /// One page whose content only paints `/Fm0`. The form is shifted 100pt right by
    /// its `/Matrix` and carries its own font resources. With `self_nested`, the form
    /// also paints itself.
    fn form_pdf(form_content: &[u8], self_nested: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let form_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut form_resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if self_nested {
            form_resources.set("XObject", dictionary! { "Fm0" => form_id });
        }
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 100.into(), 0.into()],
                "Resources" => form_resources,
            },
            form_content.to_vec(),
        );
        doc.objects.insert(form_id, Object::Stream(form));

        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q /Fm0 Do Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Fm0" => form_id },
            },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("save pdf");
        buffer
    }

    #[test]
    fn test_text_inside_form_xobject_is_extracted() {
        let pdf = form_pdf(b"BT /F1 12 Tf 72 700 Td (Disetujui Oleh) Tj ET", false);
        let doc = PdfDocument::open(&pdf).unwrap();

        assert_eq!(doc.page_text(0).unwrap(), "Disetujui Oleh");
        let hits = doc.search(0, "disetujui oleh").unwrap();
        assert_eq!(hits.len(), 1);
        // Form matrix translates x by 100.
        assert_eq!(hits[0].x0, 172.0);
        assert!((hits[0].y0 - 82.4).abs() < 1e-6);
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let pdf = form_pdf(b"BT /F1 12 Tf 0 700 Td (Loop) Tj ET /Fm0 Do", true);
        let doc = PdfDocument::open(&pdf).unwrap();

        let text = doc.page_text(0).unwrap();
        assert!(text.starts_with("Loop"));
        assert!(!doc.search(0, "loop").unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(matches!(
            PdfDocument::open(b"definitely not a pdf"),
            Err(PdfError::Parse(_))
        ));
        assert!(matches!(PdfDocument::open(b""), Err(PdfError::Parse(_))));
    }

    #[test]
    fn test_page_text_in_order() {
        let pdf = build_pdf(&[
            vec![item(72, 700, "First page"), item(72, 680, "second line")],
            vec![item(72, 700, "Another page")],
        ]);
        let doc = PdfDocument::open(&pdf).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_text(0).unwrap(), "First page\nsecond line");
        assert_eq!(doc.page_text(1).unwrap(), "Another page");
        assert!(matches!(
            doc.page_text(2),
            Err(PdfError::PageOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_lossy_layout_of_unreadable_page_is_empty() {
        let pdf = build_pdf(&[vec![item(72, 700, "x")]]);
        let doc = PdfDocument::open(&pdf).unwrap();
        let layout = doc.layout_lossy(5);
        assert!(layout.lines.is_empty());
        assert_eq!(layout.text(), "");
    }

    #[test]
    fn test_layout_uses_inherited_media_box() {
        let pdf = build_pdf(&[vec![item(72, 700, "x")]]);
        let doc = PdfDocument::open(&pdf).unwrap();
        let layout = doc.layout(0).unwrap();
        assert_eq!(layout.width, 612.0);
        assert_eq!(layout.height, 792.0);
    }

    #[test]
    fn test_search_returns_top_left_rects() {
        let pdf = build_pdf(&[vec![
            item(100, 700, "Approved by"),
            item(300, 400, "approved BY the board"),
        ]]);
        let doc = PdfDocument::open(&pdf).unwrap();
        let hits = doc.search(0, "Approved  by").unwrap();

        assert_eq!(hits.len(), 2);
        let first = hits[0];
        assert_eq!(first.x0, 100.0);
        // Baseline 700 with a 12pt font: top = 792 - (700 + 0.8 * 12).
        assert!((first.y0 - 82.4).abs() < 1e-6);
        assert!((first.height() - 12.0).abs() < 1e-6);
        assert!(first.width() > 0.0);
        assert_eq!(hits[1].x0, 300.0);
    }

    #[test]
    fn test_search_finds_repeats_on_one_line_without_overlap() {
        let pdf = build_pdf(&[vec![item(50, 500, "aaaa")]]);
        let doc = PdfDocument::open(&pdf).unwrap();
        assert_eq!(doc.search(0, "aa").unwrap().len(), 2);
        assert!(doc.search(0, "   ").unwrap().is_empty());
    }
}
