//! Content stream interpretation: turns text-showing operators into positioned glyphs
//! and groups them into lines.

use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::fonts::{load_fonts, Font, FontMap};
use super::geometry::{Matrix, Rect};
use super::{number, resolve, stream_bytes};

/// Share of the font size above the baseline.
const ASCENT: f64 = 0.8;
/// Share of the font size below the baseline.
const DESCENT: f64 = 0.2;
/// Gap between glyphs, relative to font height, that counts as a word break.
const WORD_GAP_RATIO: f64 = 0.15;
/// How deeply Form XObjects may nest before `Do` is ignored.
const MAX_FORM_DEPTH: usize = 8;

/// A glyph placed on the page (top-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    pub bbox: Rect,
    pub baseline: f64,
}

impl Glyph {
    fn height(&self) -> f64 {
        self.bbox.height()
    }

    fn is_blank(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }
}

/// Glyphs sharing a baseline, in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub glyphs: Vec<Glyph>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }
}

/// The page area that positions are reported relative to.
#[derive(Debug, Clone, Copy)]
pub struct PageFrame {
    pub left: f64,
    pub top: f64,
}

#[derive(Clone)]
struct TextState {
    font: Option<Rc<Font>>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Walks a decoded content stream, tracking the graphics and text state needed
/// to place each glyph.
pub struct Interpreter<'a> {
    fonts: &'a FontMap,
    doc: Option<&'a Document>,
    resources: Option<&'a Dictionary>,
    depth: usize,
    frame: PageFrame,
    fallback_font: Rc<Font>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    glyphs: Vec<Glyph>,
}

impl<'a> Interpreter<'a> {
    pub fn new(fonts: &'a FontMap, frame: PageFrame) -> Self {
        Self {
            fonts,
            doc: None,
            resources: None,
            depth: 0,
            frame,
            fallback_font: Rc::new(Font::default()),
            state: GraphicsState {
                ctm: Matrix::IDENTITY,
                text: TextState::default(),
            },
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            glyphs: Vec::new(),
        }
    }

    /// Resolve `Do` operands against `resources`. Without this, XObjects are skipped.
    pub fn with_resources(mut self, doc: &'a Document, resources: &'a Dictionary) -> Self {
        self.doc = Some(doc);
        self.resources = Some(resources);
        self
    }

    /// Run every operation and return the glyphs in content order.
    pub fn run(mut self, operations: &[Operation]) -> Vec<Glyph> {
        for op in operations {
            self.execute(op);
        }
        self.glyphs
    }

    fn operand(op: &Operation, index: usize) -> f64 {
        op.operands.get(index).and_then(number).unwrap_or(0.0)
    }

    fn matrix_operand(op: &Operation) -> Option<Matrix> {
        if op.operands.len() < 6 {
            return None;
        }
        Some(Matrix::new(
            Self::operand(op, 0),
            Self::operand(op, 1),
            Self::operand(op, 2),
            Self::operand(op, 3),
            Self::operand(op, 4),
            Self::operand(op, 5),
        ))
    }

    fn execute(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Self::matrix_operand(op) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.state.text.font = self.fonts.get(name).cloned();
                }
                self.state.text.size = Self::operand(op, 1);
            }
            "Tc" => self.state.text.char_spacing = Self::operand(op, 0),
            "Tw" => self.state.text.word_spacing = Self::operand(op, 0),
            "Tz" => self.state.text.horizontal_scale = Self::operand(op, 0) / 100.0,
            "TL" => self.state.text.leading = Self::operand(op, 0),
            "Ts" => self.state.text.rise = Self::operand(op, 0),
            "Td" => self.move_line(Self::operand(op, 0), Self::operand(op, 1)),
            "TD" => {
                let ty = Self::operand(op, 1);
                self.state.text.leading = -ty;
                self.move_line(Self::operand(op, 0), ty);
            }
            "Tm" => {
                if let Some(m) = Self::matrix_operand(op) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.state.text.word_spacing = Self::operand(op, 0);
                self.state.text.char_spacing = Self::operand(op, 1);
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let text = &self.state.text;
                                    let tx = -adjust / 1000.0 * text.size * text.horizontal_scale;
                                    self.text_matrix =
                                        Matrix::translation(tx, 0.0).then(&self.text_matrix);
                                }
                            }
                        }
                    }
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.draw_form(name);
                }
            }
            _ => {}
        }
    }

    /// Interpret a Form XObject in place, as if its content were inlined between
    /// `q` and `Q` with the form's `/Matrix` applied. Image XObjects are ignored.
    fn draw_form(&mut self, name: &[u8]) {
        let (Some(doc), Some(resources)) = (self.doc, self.resources) else {
            return;
        };
        if self.depth >= MAX_FORM_DEPTH {
            debug!(
                "Form XObject nesting too deep, skipping /{}",
                String::from_utf8_lossy(name)
            );
            return;
        }

        let xobject = match resources.get(b"XObject").ok().map(|o| resolve(doc, o)) {
            Some(Object::Dictionary(xobjects)) => xobjects.get(name).ok(),
            _ => None,
        };
        let Some(xobject) = xobject else {
            return;
        };
        let Object::Stream(form) = resolve(doc, xobject) else {
            return;
        };
        let subtype = form.dict.get(b"Subtype").ok().map(|o| resolve(doc, o));
        if !matches!(subtype, Some(Object::Name(n)) if n == b"Form") {
            return;
        }

        let Some(data) = stream_bytes(doc, xobject) else {
            return;
        };
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                debug!("Skipping undecodable form /{}: {}", String::from_utf8_lossy(name), e);
                return;
            }
        };

        let form_resources = match form.dict.get(b"Resources").ok().map(|o| resolve(doc, o)) {
            Some(Object::Dictionary(own)) => own,
            _ => resources,
        };
        let mut fonts = self.fonts.clone();
        fonts.extend(load_fonts(doc, form_resources));

        let form_matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| matrix_from_array(doc, o))
            .unwrap_or(Matrix::IDENTITY);
        let mut state = self.state.clone();
        state.ctm = form_matrix.then(&self.state.ctm);

        let nested = Interpreter {
            fonts: &fonts,
            doc: Some(doc),
            resources: Some(form_resources),
            depth: self.depth + 1,
            frame: self.frame,
            fallback_font: self.fallback_font.clone(),
            state,
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            glyphs: Vec::new(),
        };
        let glyphs = nested.run(&content.operations);
        self.glyphs.extend(glyphs);
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, bytes: &[u8]) {
        let text = self.state.text.clone();
        let font = text.font.clone().unwrap_or_else(|| self.fallback_font.clone());

        for code in font.decode(bytes) {
            let render = self.text_matrix.then(&self.state.ctm);
            let glyph_width = code.width / 1000.0 * text.size * text.horizontal_scale;
            let height = text.size * render.vertical_scale();

            let (x_start, baseline) = render.apply(0.0, text.rise);
            let (x_end, _) = render.apply(glyph_width, text.rise);

            if !code.text.is_empty() {
                let left = x_start - self.frame.left;
                let right = x_end - self.frame.left;
                let top = self.frame.top - (baseline + ASCENT * height);
                let bottom = self.frame.top - (baseline - DESCENT * height);
                self.glyphs.push(Glyph {
                    text: code.text,
                    bbox: Rect::new(left, top, right, bottom),
                    baseline: self.frame.top - baseline,
                });
            }

            let mut advance = code.width / 1000.0 * text.size + text.char_spacing;
            if code.is_word_space {
                advance += text.word_spacing;
            }
            advance *= text.horizontal_scale;
            self.text_matrix = Matrix::translation(advance, 0.0).then(&self.text_matrix);
        }
    }
}

fn matrix_from_array(doc: &Document, obj: &Object) -> Option<Matrix> {
    let Object::Array(values) = resolve(doc, obj) else {
        return None;
    };
    let values: Vec<f64> = values
        .iter()
        .map(|v| number(resolve(doc, v)))
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// Group glyphs into lines. A new line starts when the baseline moves by more than
/// half a glyph height or the pen jumps backwards. Visible gaps inside a line become
/// synthetic spaces.
pub fn group_lines(glyphs: Vec<Glyph>) -> Vec<TextLine> {
    let mut lines: Vec<TextLine> = Vec::new();
    let mut current = TextLine::default();

    for glyph in glyphs {
        if let Some(last) = current.glyphs.last() {
            let height = last.height().max(glyph.height()).max(1.0);
            let same_baseline = (last.baseline - glyph.baseline).abs() <= height / 2.0;
            let moved_back = glyph.bbox.x0 < last.bbox.x0 - height / 2.0;

            if !same_baseline || moved_back {
                lines.push(std::mem::take(&mut current));
            } else {
                let gap = glyph.bbox.x0 - last.bbox.x1;
                if gap > height * WORD_GAP_RATIO && !last.is_blank() && !glyph.is_blank() {
                    let space = Glyph {
                        text: " ".to_string(),
                        bbox: Rect::new(last.bbox.x1, last.bbox.y0, glyph.bbox.x0, last.bbox.y1),
                        baseline: last.baseline,
                    };
                    current.glyphs.push(space);
                }
            }
        }
        current.glyphs.push(glyph);
    }

    if !current.glyphs.is_empty() {
        lines.push(current);
    }
    lines
}
