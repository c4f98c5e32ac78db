//! Font decoding: byte strings to Unicode text plus glyph advances.
//!
//! Handles simple fonts (single-byte codes, `Widths` array) and Type0 fonts
//! (two-byte codes, `W` array on the descendant). A `ToUnicode` CMap wins over
//! `/Differences`, which win over the base encoding (WinAnsi unless the font
//! names MacRoman).

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::{Dictionary, Document, Object};

use super::{number, resolve, stream_bytes};

/// Width used when a font carries no metrics (standard 14 fonts, broken files).
const FALLBACK_WIDTH: f64 = 500.0;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    /// Unicode text for the code (may be empty or several chars).
    pub text: String,
    /// Horizontal advance in glyph space units (1/1000 of text space).
    pub width: f64,
    /// Single-byte code 32, the only code word spacing applies to.
    pub is_word_space: bool,
}

/// Fonts of a resource dictionary, keyed by resource name.
pub type FontMap = HashMap<Vec<u8>, Rc<Font>>;

/// Load every font listed under `/Font` in a resource dictionary.
pub fn load_fonts(doc: &Document, resources: &Dictionary) -> FontMap {
    let mut fonts = FontMap::new();
    let Some(Object::Dictionary(font_dict)) = resources.get(b"Font").ok().map(|o| resolve(doc, o))
    else {
        return fonts;
    };
    for (name, value) in font_dict.iter() {
        if let Object::Dictionary(dict) = resolve(doc, value) {
            fonts.insert(name.clone(), Rc::new(Font::load(doc, dict)));
        }
    }
    fonts
}

/// Single-byte base encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BaseEncoding {
    #[default]
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"WinAnsiEncoding" => Some(Self::WinAnsi),
            b"MacRomanEncoding" => Some(Self::MacRoman),
            _ => None,
        }
    }

    fn decode(self, byte: u8) -> char {
        match self {
            Self::WinAnsi => win_ansi_char(byte),
            Self::MacRoman => mac_roman_char(byte),
        }
    }
}

/// Decoding information for one font resource.
#[derive(Debug, Clone, Default)]
pub struct Font {
    two_byte: bool,
    to_unicode: Option<HashMap<u32, String>>,
    encoding: BaseEncoding,
    differences: HashMap<u32, String>,
    widths: HashMap<u32, f64>,
    default_width: Option<f64>,
}

impl Font {
    /// Load a font from its dictionary. Missing or malformed entries degrade to defaults.
    pub fn load(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| match resolve(doc, o) {
                Object::Name(n) => Some(n.as_slice()),
                _ => None,
            })
            .unwrap_or_default();
        let two_byte = subtype == b"Type0";

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| stream_bytes(doc, o))
            .map(|data| parse_to_unicode(&String::from_utf8_lossy(&data)))
            .filter(|map| !map.is_empty());

        let mut font = Font {
            two_byte,
            to_unicode,
            ..Default::default()
        };

        if two_byte {
            font.load_cid_widths(doc, dict);
        } else {
            font.load_encoding(doc, dict);
            font.load_simple_widths(doc, dict);
        }
        font
    }

    /// `/Encoding` is either a base encoding name or a dictionary with an optional
    /// `/BaseEncoding` and a `/Differences` array of `code /name /name ... code /name`.
    fn load_encoding(&mut self, doc: &Document, dict: &Dictionary) {
        let encoding = match dict.get(b"Encoding").ok().map(|o| resolve(doc, o)) {
            Some(Object::Name(name)) => {
                self.encoding = BaseEncoding::from_name(name).unwrap_or_default();
                return;
            }
            Some(Object::Dictionary(encoding)) => encoding,
            _ => return,
        };

        let base = encoding.get(b"BaseEncoding").ok().map(|o| resolve(doc, o));
        if let Some(Object::Name(base)) = base {
            self.encoding = BaseEncoding::from_name(base).unwrap_or_default();
        }

        let Some(Object::Array(differences)) =
            encoding.get(b"Differences").ok().map(|o| resolve(doc, o))
        else {
            return;
        };
        let mut code: Option<u32> = None;
        for entry in differences {
            match resolve(doc, entry) {
                Object::Name(glyph) => {
                    if let Some(current) = code.filter(|c| *c <= 0xFF) {
                        if let Some(text) = glyph_text(&String::from_utf8_lossy(glyph)) {
                            self.differences.insert(current, text);
                        }
                    }
                    code = code.and_then(|c| c.checked_add(1));
                }
                other => {
                    if let Some(n) = number(other) {
                        code = (n >= 0.0).then_some(n as u32);
                    }
                }
            }
        }
    }

    fn load_simple_widths(&mut self, doc: &Document, dict: &Dictionary) {
        let first = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(resolve(doc, o)))
            .unwrap_or(0.0) as u32;
        if let Some(Object::Array(widths)) = dict.get(b"Widths").ok().map(|o| resolve(doc, o)) {
            for (i, w) in widths.iter().enumerate() {
                let Some(code) = u32::try_from(i).ok().and_then(|i| first.checked_add(i)) else {
                    break;
                };
                if let Some(w) = number(resolve(doc, w)) {
                    self.widths.insert(code, w);
                }
            }
        }
    }

    fn load_cid_widths(&mut self, doc: &Document, dict: &Dictionary) {
        let descendant = match dict.get(b"DescendantFonts").ok().map(|o| resolve(doc, o)) {
            Some(Object::Array(fonts)) => fonts.first().map(|o| resolve(doc, o)),
            _ => None,
        };
        let Some(Object::Dictionary(descendant)) = descendant else {
            return;
        };

        self.default_width = Some(
            descendant
                .get(b"DW")
                .ok()
                .and_then(|o| number(resolve(doc, o)))
                .unwrap_or(1000.0),
        );

        let Some(Object::Array(w)) = descendant.get(b"W").ok().map(|o| resolve(doc, o)) else {
            return;
        };

        // Entries are either `c [w1 w2 ...]` or `c_first c_last w`.
        let mut i = 0;
        while i < w.len() {
            let Some(start) = number(resolve(doc, &w[i])) else {
                break;
            };
            let start = start as u32;
            match w.get(i + 1).map(|o| resolve(doc, o)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        let Some(code) =
                            u32::try_from(offset).ok().and_then(|o| start.checked_add(o))
                        else {
                            break;
                        };
                        if let Some(width) = number(resolve(doc, width)) {
                            self.widths.insert(code, width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = number(end).map(|e| e as u32);
                    let width = w.get(i + 2).and_then(|o| number(resolve(doc, o)));
                    if let (Some(end), Some(width)) = (end, width) {
                        for code in start..=end.min(start.saturating_add(0xFFFF)) {
                            self.widths.insert(code, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn width_of(&self, code: u32) -> f64 {
        self.widths
            .get(&code)
            .copied()
            .or(self.default_width)
            .unwrap_or(FALLBACK_WIDTH)
    }

    /// Split a string operand into character codes and decode each one.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        };

        codes
            .into_iter()
            .map(|code| {
                let mapped = self
                    .to_unicode
                    .as_ref()
                    .and_then(|m| m.get(&code))
                    .or_else(|| self.differences.get(&code));
                let text = match mapped {
                    Some(mapped) => mapped.clone(),
                    None if self.two_byte => char::from_u32(code)
                        .filter(|c| !c.is_control())
                        .map(String::from)
                        .unwrap_or_default(),
                    None => self.encoding.decode(code as u8).to_string(),
                };
                DecodedCode {
                    text,
                    width: self.width_of(code),
                    is_word_space: !self.two_byte && code == 32,
                }
            })
            .collect()
    }
}

/// Map a single byte through WinAnsiEncoding. Bytes outside the 0x80-0x9F
/// block coincide with Latin-1.
fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x82 => '‚',
        0x84 => '„',
        0x85 => '…',
        0x8A => 'Š',
        0x8C => 'Œ',
        0x8E => 'Ž',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x95 => '•',
        0x96 => '–',
        0x97 => '—',
        0x99 => '™',
        0x9A => 'š',
        0x9C => 'œ',
        0x9E => 'ž',
        0x9F => 'Ÿ',
        other => char::from(other),
    }
}

/// Upper half (0x80-0xFF) of MacRomanEncoding. The lower half is ASCII.
const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ',
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

fn mac_roman_char(byte: u8) -> char {
    match byte {
        0x00..=0x7F => char::from(byte),
        high => MAC_ROMAN_HIGH[usize::from(high - 0x80)],
    }
}

/// Text for a PostScript glyph name: `uniXXXX` names, single ASCII letters, and the
/// common Latin glyph names. Unknown names yield `None`.
fn glyph_text(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni").filter(|h| h.len() == 4) {
        return u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return Some(name.to_string());
    }

    let text = match name {
        "space" | "nbspace" => " ",
        "exclam" => "!",
        "quotedbl" => "\"",
        "numbersign" => "#",
        "dollar" => "$",
        "percent" => "%",
        "ampersand" => "&",
        "quotesingle" => "'",
        "parenleft" => "(",
        "parenright" => ")",
        "asterisk" => "*",
        "plus" => "+",
        "comma" => ",",
        "hyphen" | "minus" => "-",
        "period" => ".",
        "slash" => "/",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "colon" => ":",
        "semicolon" => ";",
        "less" => "<",
        "equal" => "=",
        "greater" => ">",
        "question" => "?",
        "at" => "@",
        "bracketleft" => "[",
        "backslash" => "\\",
        "bracketright" => "]",
        "asciicircum" => "^",
        "underscore" => "_",
        "grave" => "`",
        "braceleft" => "{",
        "bar" => "|",
        "braceright" => "}",
        "asciitilde" => "~",
        "quoteleft" => "‘",
        "quoteright" => "’",
        "quotedblleft" => "“",
        "quotedblright" => "”",
        "quotesinglbase" => "‚",
        "quotedblbase" => "„",
        "guillemotleft" => "«",
        "guillemotright" => "»",
        "endash" => "–",
        "emdash" => "—",
        "bullet" => "•",
        "ellipsis" => "…",
        "periodcentered" => "·",
        "degree" => "°",
        "section" => "§",
        "paragraph" => "¶",
        "copyright" => "©",
        "registered" => "®",
        "trademark" => "™",
        "dagger" => "†",
        "daggerdbl" => "‡",
        "cent" => "¢",
        "sterling" => "£",
        "yen" => "¥",
        "Euro" => "€",
        "multiply" => "×",
        "divide" => "÷",
        "fi" => "fi",
        "fl" => "fl",
        "ff" => "ff",
        "ffi" => "ffi",
        "ffl" => "ffl",
        "germandbls" => "ß",
        "dotlessi" => "ı",
        "AE" => "Æ",
        "ae" => "æ",
        "OE" => "Œ",
        "oe" => "œ",
        "Oslash" => "Ø",
        "oslash" => "ø",
        "Lslash" => "Ł",
        "lslash" => "ł",
        "Scaron" => "Š",
        "scaron" => "š",
        "Zcaron" => "Ž",
        "zcaron" => "ž",
        "Ccedilla" => "Ç",
        "ccedilla" => "ç",
        "Ntilde" => "Ñ",
        "ntilde" => "ñ",
        _ => return accented(name).map(String::from),
    };
    Some(text.to_string())
}

/// Vowels and `y` with a Latin-1 accent suffix, e.g. `eacute` or `Udieresis`.
fn accented(name: &str) -> Option<char> {
    let mut chars = name.chars();
    let base = chars.next()?;
    let accent = chars.as_str();
    let column = match accent {
        "grave" => 0,
        "acute" => 1,
        "circumflex" => 2,
        "tilde" => 3,
        "dieresis" => 4,
        "ring" => 5,
        _ => return None,
    };
    let row: [Option<char>; 6] = match base {
        'A' => [Some('À'), Some('Á'), Some('Â'), Some('Ã'), Some('Ä'), Some('Å')],
        'E' => [Some('È'), Some('É'), Some('Ê'), None, Some('Ë'), None],
        'I' => [Some('Ì'), Some('Í'), Some('Î'), None, Some('Ï'), None],
        'O' => [Some('Ò'), Some('Ó'), Some('Ô'), Some('Õ'), Some('Ö'), None],
        'U' => [Some('Ù'), Some('Ú'), Some('Û'), None, Some('Ü'), None],
        'Y' => [None, Some('Ý'), None, None, Some('Ÿ'), None],
        'a' => [Some('à'), Some('á'), Some('â'), Some('ã'), Some('ä'), Some('å')],
        'e' => [Some('è'), Some('é'), Some('ê'), None, Some('ë'), None],
        'i' => [Some('ì'), Some('í'), Some('î'), None, Some('ï'), None],
        'o' => [Some('ò'), Some('ó'), Some('ô'), Some('õ'), Some('ö'), None],
        'u' => [Some('ù'), Some('ú'), Some('û'), None, Some('ü'), None],
        'y' => [None, Some('ý'), None, None, Some('ÿ'), None],
        _ => return None,
    };
    row[column]
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    Word(String),
    OpenArray,
    CloseArray,
}

fn tokenize_cmap(source: &str) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' if chars.peek() == Some(&'<') => {
                chars.next();
            }
            '>' if chars.peek() == Some(&'>') => {
                chars.next();
            }
            '<' => {
                let mut hex = String::new();
                for h in chars.by_ref() {
                    if h == '>' {
                        break;
                    }
                    if h.is_ascii_hexdigit() {
                        hex.push(h);
                    }
                }
                if hex.len() % 2 == 1 {
                    hex.push('0');
                }
                let bytes = (0..hex.len())
                    .step_by(2)
                    .filter_map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
            }
            '[' => tokens.push(CMapToken::OpenArray),
            ']' => tokens.push(CMapToken::CloseArray),
            '%' => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' || skipped == '\r' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || "<>[]%".contains(next) {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(CMapToken::Word(word));
            }
        }
    }
    tokens
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Increment the last UTF-16 unit of a destination string, as bfrange requires.
fn offset_text(bytes: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(source: &str) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(source);
    let mut map = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(code_value(src), utf16_text(dst));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1])
                    else {
                        break;
                    };
                    let (lo, hi) = (code_value(lo), code_value(hi));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            for code in lo..=hi.min(lo.saturating_add(0xFFFF)) {
                                map.insert(code, offset_text(dst, code - lo));
                            }
                            i += 3;
                        }
                        CMapToken::OpenArray => {
                            i += 3;
                            let mut code = Some(lo);
                            while let Some(CMapToken::Hex(dst)) = tokens.get(i) {
                                if let Some(current) = code.filter(|c| *c <= hi) {
                                    map.insert(current, utf16_text(dst));
                                }
                                code = code.and_then(|c| c.checked_add(1));
                                i += 1;
                            }
                            if tokens.get(i) == Some(&CMapToken::CloseArray) {
                                i += 1;
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}
