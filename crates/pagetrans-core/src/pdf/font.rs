//! Fonts for overlay text.
//!
//! A TrueType or OpenType font, given by path or found among common system
//! fonts, is embedded as a composite font so any script it covers can be
//! drawn. Without one, the standard-14 Helvetica is used and characters
//! outside WinAnsiEncoding are drawn as `?`.
//!
//! # PDF Font Structure
//!
//! Embedded fonts use the composite layout with Identity-H encoding, so the
//! two-byte codes in content streams are glyph IDs:
//! - **Type0 font**: top-level dictionary referencing:
//!   - **CIDFont**: per-glyph widths (`W`) and the descriptor:
//!     - **FontDescriptor**: flags, bounding box, ascent/descent
//!     - **FontFile2** (TrueType outlines) or **FontFile3** (CFF outlines)
//!   - **ToUnicode CMap**: glyph IDs back to Unicode for copy/paste

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, info, warn};
use ttf_parser::{Face, name_id};

use crate::error::{Error, Result};

/// Resource name the overlay content stream refers to.
pub const FONT_RESOURCE: &str = "FTrans";

/// Helvetica advance widths for U+0020..=U+007E, in 1/1000 em.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica width for everything outside printable ASCII.
const HELVETICA_DEFAULT_WIDTH: u16 = 556;

/// Helvetica ascender, as a fraction of the font size.
const HELVETICA_ASCENT: f32 = 0.718;

/// Tried in order when no font path is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/google-droid-sans-fonts/DroidSansFallbackFull.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arialuni.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

/// Base font name when the font has no usable PostScript name.
const FALLBACK_FONT_NAME: &str = "PagetransOverlay";

/// Entries per `beginbfchar` section; the CMap format caps it at 100.
const BFCHAR_CHUNK: usize = 100;

/// Font used to draw translated text.
#[derive(Debug, Clone, Default)]
pub enum OverlayFont {
    /// Standard-14 Helvetica, WinAnsi repertoire only
    #[default]
    Helvetica,
    /// A TrueType/OpenType font embedded into every composited page
    Embedded(Arc<EmbeddedFont>),
}

impl OverlayFont {
    /// The font at `path`, or the first usable system font when `None`.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let font = EmbeddedFont::from_file(path)?;
                info!("Using overlay font {} ({})", path.display(), font.base_name);
                Ok(Self::Embedded(Arc::new(font)))
            }
            None => Ok(Self::discover()),
        }
    }

    /// First usable font among common system locations, Helvetica if none.
    pub fn discover() -> Self {
        for candidate in SYSTEM_FONT_CANDIDATES {
            let path = Path::new(candidate);
            if !path.is_file() {
                continue;
            }
            match EmbeddedFont::from_file(path) {
                Ok(font) => {
                    info!("Using overlay font {}", path.display());
                    return Self::Embedded(Arc::new(font));
                }
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }

        warn!("No Unicode font found, overlays fall back to Helvetica; set font_path for non-Latin scripts");
        Self::Helvetica
    }

    /// Ascender as a fraction of the font size.
    pub fn ascent(&self) -> f32 {
        match self {
            Self::Helvetica => HELVETICA_ASCENT,
            Self::Embedded(font) => font.ascent(),
        }
    }

    /// Advance of each character in PDF points at the given font size.
    pub fn char_widths(&self, text: &str, font_size: f32) -> Vec<f32> {
        match self {
            Self::Helvetica => text
                .chars()
                .map(|c| f32::from(helvetica_width(c)) * font_size / 1000.0)
                .collect(),
            Self::Embedded(font) => font.char_widths(text, font_size),
        }
    }

    /// Width of a string in PDF points at the given font size.
    pub fn string_width(&self, text: &str, font_size: f32) -> f32 {
        self.char_widths(text, font_size).iter().sum()
    }

    /// Hex string body (without angle brackets) for a `Tj` operand.
    pub fn encode_hex(&self, text: &str) -> String {
        match self {
            Self::Helvetica => text.chars().fold(String::new(), |mut acc, c| {
                let _ = write!(acc, "{:02X}", win_ansi_byte(c).unwrap_or(b'?'));
                acc
            }),
            Self::Embedded(font) => font.glyph_ids(text).into_iter().fold(String::new(), |mut acc, gid| {
                let _ = write!(acc, "{gid:04X}");
                acc
            }),
        }
    }

    /// Number of non-whitespace characters the font cannot draw.
    pub fn missing_chars(&self, text: &str) -> usize {
        match self {
            Self::Helvetica => text
                .chars()
                .filter(|c| !c.is_whitespace() && win_ansi_byte(*c).is_none())
                .count(),
            Self::Embedded(font) => font.missing_chars(text),
        }
    }

    /// Add the font to a page's resources under [`FONT_RESOURCE`].
    ///
    /// `text` is everything that will be drawn with it; an embedded font
    /// only carries widths and Unicode mappings for those glyphs.
    pub fn register(&self, doc: &mut Document, page_id: ObjectId, text: &str) -> lopdf::Result<&'static str> {
        let font_id = match self {
            Self::Helvetica => doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Font".to_vec())),
                ("Subtype", Object::Name(b"Type1".to_vec())),
                ("BaseFont", Object::Name(b"Helvetica".to_vec())),
                ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
            ])),
            Self::Embedded(font) => font.embed(doc, text),
        };

        let mut resources = resolve_resources(doc, page_id)?;

        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(d)) => d.clone(),
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).map_or_else(|_| Dictionary::new(), Clone::clone),
            _ => Dictionary::new(),
        };
        fonts.set(FONT_RESOURCE, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        // Inline on the page so shared or inherited resource dicts stay untouched
        doc.get_dictionary_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));

        Ok(FONT_RESOURCE)
    }
}

/// A parsed TrueType/OpenType font program.
pub struct EmbeddedFont {
    data: Vec<u8>,
    base_name: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    cff_outlines: bool,
}

impl std::fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("base_name", &self.base_name)
            .field("bytes", &self.data.len())
            .field("cff_outlines", &self.cff_outlines)
            .finish_non_exhaustive()
    }
}

impl EmbeddedFont {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::FontLoad(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_bytes(data).map_err(|e| match e {
            Error::FontLoad(reason) => Error::FontLoad(format!("{}: {}", path.display(), reason)),
            other => other,
        })
    }

    /// Parse a single TrueType or OpenType font. Collections are rejected,
    /// since a PDF font file must hold exactly one font.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.starts_with(b"ttcf") {
            return Err(Error::FontLoad(
                "font collections (.ttc) cannot be embedded, use a .ttf or .otf file".to_string(),
            ));
        }

        let (base_name, units_per_em, ascender, descender, cap_height, bbox, cff_outlines) = {
            let face =
                Face::parse(&data, 0).map_err(|e| Error::FontLoad(format!("Failed to parse font: {e}")))?;
            let rect = face.global_bounding_box();
            (
                postscript_name(&face),
                face.units_per_em(),
                face.ascender(),
                face.descender(),
                face.capital_height().unwrap_or_else(|| face.ascender()),
                [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
                face.tables().cff.is_some(),
            )
        };

        Ok(Self {
            data,
            base_name,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox,
            cff_outlines,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Parsed on demand; validated once in [`Self::from_bytes`].
    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    fn ascent(&self) -> f32 {
        f32::from(self.ascender) / f32::from(self.units_per_em)
    }

    /// Font units to the 1/1000 em of PDF glyph space.
    fn scale(&self, units: i64) -> i64 {
        units * 1000 / i64::from(self.units_per_em)
    }

    fn char_widths(&self, text: &str, font_size: f32) -> Vec<f32> {
        let Some(face) = self.face() else {
            return vec![0.0; text.chars().count()];
        };
        let per_unit = font_size / f32::from(self.units_per_em);
        text.chars()
            .map(|c| {
                let advance = face
                    .glyph_index(c)
                    .and_then(|g| face.glyph_hor_advance(g))
                    .unwrap_or(0);
                f32::from(advance) * per_unit
            })
            .collect()
    }

    /// Glyph ID per character, 0 (.notdef) where the font has none.
    fn glyph_ids(&self, text: &str) -> Vec<u16> {
        let Some(face) = self.face() else {
            return vec![0; text.chars().count()];
        };
        text.chars().map(|c| face.glyph_index(c).map_or(0, |g| g.0)).collect()
    }

    fn missing_chars(&self, text: &str) -> usize {
        let Some(face) = self.face() else {
            return text.chars().filter(|c| !c.is_whitespace()).count();
        };
        text.chars()
            .filter(|c| !c.is_whitespace() && face.glyph_index(*c).is_none())
            .count()
    }

    /// Glyph ID to (width in 1/1000 em, first char mapped to it).
    fn used_glyphs(&self, text: &str) -> BTreeMap<u16, (i64, char)> {
        let mut used = BTreeMap::new();
        let Some(face) = self.face() else {
            return used;
        };
        for c in text.chars() {
            if let Some(gid) = face.glyph_index(c) {
                let advance = face.glyph_hor_advance(gid).unwrap_or(0);
                let width = self.scale(i64::from(advance));
                used.entry(gid.0).or_insert((width, c));
            }
        }
        used
    }

    /// Add the Type0 font and its parts to `doc`, returning the Type0 id.
    fn embed(&self, doc: &mut Document, text: &str) -> ObjectId {
        let used = self.used_glyphs(text);

        let font_file_id = self.add_font_file(doc);
        let descriptor_id = doc.add_object(self.font_descriptor(font_file_id));
        let cid_font_id = doc.add_object(self.cid_font(descriptor_id, &used));
        let to_unicode_id =
            doc.add_object(Stream::new(Dictionary::new(), to_unicode_cmap(&used)).with_compression(true));

        doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type0".to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"Identity-H".to_vec())),
            ("DescendantFonts", Object::Array(vec![Object::Reference(cid_font_id)])),
            ("ToUnicode", Object::Reference(to_unicode_id)),
        ]))
    }

    fn add_font_file(&self, doc: &mut Document) -> ObjectId {
        let dict = if self.cff_outlines {
            Dictionary::from_iter([("Subtype", Object::Name(b"OpenType".to_vec()))])
        } else {
            Dictionary::from_iter([(
                "Length1",
                Object::Integer(i64::try_from(self.data.len()).unwrap_or(i64::MAX)),
            )])
        };
        doc.add_object(Stream::new(dict, self.data.clone()).with_compression(true))
    }

    fn font_descriptor(&self, font_file_id: ObjectId) -> Dictionary {
        let file_key = if self.cff_outlines { "FontFile3" } else { "FontFile2" };
        let bbox = self.bbox.iter().map(|&v| Object::Integer(self.scale(i64::from(v)))).collect();

        Dictionary::from_iter([
            ("Type", Object::Name(b"FontDescriptor".to_vec())),
            ("FontName", Object::Name(self.base_name.as_bytes().to_vec())),
            // Nonsymbolic
            ("Flags", Object::Integer(32)),
            ("FontBBox", Object::Array(bbox)),
            ("ItalicAngle", Object::Integer(0)),
            ("Ascent", Object::Integer(self.scale(i64::from(self.ascender)))),
            ("Descent", Object::Integer(self.scale(i64::from(self.descender)))),
            ("CapHeight", Object::Integer(self.scale(i64::from(self.cap_height)))),
            ("StemV", Object::Integer(80)),
            (file_key, Object::Reference(font_file_id)),
        ])
    }

    fn cid_font(&self, descriptor_id: ObjectId, used: &BTreeMap<u16, (i64, char)>) -> Dictionary {
        let subtype: &[u8] = if self.cff_outlines { b"CIDFontType0" } else { b"CIDFontType2" };

        let mut dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(subtype.to_vec())),
            ("BaseFont", Object::Name(self.base_name.as_bytes().to_vec())),
            (
                "CIDSystemInfo",
                Object::Dictionary(Dictionary::from_iter([
                    ("Registry", Object::String(b"Adobe".to_vec(), StringFormat::Literal)),
                    ("Ordering", Object::String(b"Identity".to_vec(), StringFormat::Literal)),
                    ("Supplement", Object::Integer(0)),
                ])),
            ),
            ("FontDescriptor", Object::Reference(descriptor_id)),
            ("DW", Object::Integer(1000)),
            ("W", Object::Array(widths_array(used))),
        ]);
        if !self.cff_outlines {
            dict.set("CIDToGIDMap", Object::Name(b"Identity".to_vec()));
        }
        dict
    }
}

/// `W` array grouping consecutive glyph IDs: `[gid [w1 w2 ...] ...]`.
fn widths_array(used: &BTreeMap<u16, (i64, char)>) -> Vec<Object> {
    let mut result = Vec::new();
    let mut iter = used.iter().peekable();

    while let Some((&first_gid, &(first_width, _))) = iter.next() {
        let mut widths = vec![Object::Integer(first_width)];
        let mut next_gid = u32::from(first_gid) + 1;

        while let Some(&(&gid, &(width, _))) = iter.peek() {
            if u32::from(gid) != next_gid {
                break;
            }
            widths.push(Object::Integer(width));
            next_gid += 1;
            iter.next();
        }

        result.push(Object::Integer(i64::from(first_gid)));
        result.push(Object::Array(widths));
    }

    result
}

/// ToUnicode CMap mapping each used glyph ID to its character.
fn to_unicode_cmap(used: &BTreeMap<u16, (i64, char)>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(u16, char)> = used.iter().map(|(&gid, &(_, c))| (gid, c)).collect();
    for chunk in entries.chunks(BFCHAR_CHUNK) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for &(gid, c) in chunk {
            let mut units = [0u16; 2];
            let utf16 = c.encode_utf16(&mut units).iter().fold(String::new(), |mut acc, u| {
                let _ = write!(acc, "{u:04X}");
                acc
            });
            let _ = writeln!(cmap, "<{gid:04X}> <{utf16}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap.into_bytes()
}

/// PostScript name restricted to characters safe in a PDF name.
fn postscript_name(face: &Face<'_>) -> String {
    let name: String = face
        .names()
        .into_iter()
        .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
        .find_map(|n| n.to_string())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();

    if name.is_empty() {
        FALLBACK_FONT_NAME.to_string()
    } else {
        name
    }
}

fn helvetica_width(c: char) -> u16 {
    let code = u32::from(c);
    if (0x20..=0x7E).contains(&code) {
        // In range by the check above
        #[allow(clippy::cast_possible_truncation)]
        let idx = (code - 0x20) as usize;
        HELVETICA_ASCII_WIDTHS[idx]
    } else {
        HELVETICA_DEFAULT_WIDTH
    }
}

/// WinAnsiEncoding byte of a char, `None` when it has none.
fn win_ansi_byte(c: char) -> Option<u8> {
    let code = u32::from(c);
    match code {
        // ASCII and the Latin-1 upper half map directly
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(code).ok(),
        _ => match c {
            '\u{20AC}' => Some(0x80), // €
            '\u{201A}' => Some(0x82),
            '\u{0192}' => Some(0x83),
            '\u{201E}' => Some(0x84),
            '\u{2026}' => Some(0x85), // …
            '\u{2020}' => Some(0x86),
            '\u{2021}' => Some(0x87),
            '\u{02C6}' => Some(0x88),
            '\u{2030}' => Some(0x89),
            '\u{0160}' => Some(0x8A),
            '\u{2039}' => Some(0x8B),
            '\u{0152}' => Some(0x8C),
            '\u{017D}' => Some(0x8E),
            '\u{2018}' => Some(0x91),
            '\u{2019}' => Some(0x92),
            '\u{201C}' => Some(0x93),
            '\u{201D}' => Some(0x94),
            '\u{2022}' => Some(0x95), // •
            '\u{2013}' => Some(0x96), // en dash
            '\u{2014}' => Some(0x97), // em dash
            '\u{02DC}' => Some(0x98),
            '\u{2122}' => Some(0x99),
            '\u{0161}' => Some(0x9A),
            '\u{203A}' => Some(0x9B),
            '\u{0153}' => Some(0x9C),
            '\u{017E}' => Some(0x9E),
            '\u{0178}' => Some(0x9F),
            '\t' | '\n' | '\r' => Some(b' '),
            _ => None,
        },
    }
}

/// Resolve the Resources dictionary for a page, following references and
/// inheritance from parent Pages nodes.
fn resolve_resources(doc: &Document, page_id: ObjectId) -> lopdf::Result<Dictionary> {
    let mut node = Some(doc.get_dictionary(page_id)?);
    // Depth limit guards against Parent cycles in malformed files
    for _ in 0..16 {
        let Some(dict) = node else { break };
        if let Ok(res) = dict.get(b"Resources")
            && let Some(resolved) = resolve_dict(doc, res)
        {
            return Ok(resolved);
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }

    Ok(Dictionary::new())
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::test_support::{minimal_truetype, single_page_pdf};

    fn cjk_font() -> OverlayFont {
        let data = minimal_truetype(&['你', '好', '世', '界']);
        OverlayFont::Embedded(Arc::new(EmbeddedFont::from_bytes(data).unwrap()))
    }

    fn page_font(doc: &Document, page_id: ObjectId) -> Dictionary {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        let id = fonts.get(FONT_RESOURCE.as_bytes()).unwrap().as_reference().unwrap();
        doc.get_dictionary(id).unwrap().clone()
    }

    #[test]
    fn test_helvetica_widths() {
        let font = OverlayFont::Helvetica;
        assert!((font.string_width(" ", 1000.0) - 278.0).abs() < 1e-3);
        assert!((font.string_width("W", 1000.0) - 944.0).abs() < 1e-3);
        assert!((font.string_width("ß", 1000.0) - 556.0).abs() < 1e-3);
        assert!((font.string_width("ii", 10.0) - 4.44).abs() < 1e-4);
    }

    #[test]
    fn test_helvetica_win_ansi_encoding() {
        let font = OverlayFont::Helvetica;
        assert_eq!(font.encode_hex("Grüße €"), "4772FCDF652080");
        assert_eq!(font.encode_hex("日本"), "3F3F");
        assert_eq!(font.missing_chars("日本 ok"), 2);
        assert_eq!(font.missing_chars("Grüße"), 0);
    }

    #[test]
    fn test_embedded_font_encodes_glyph_ids() {
        let font = cjk_font();
        let hex = font.encode_hex("你好世界");
        assert_eq!(hex, "0001000200030004");
        assert!(!hex.contains("3F"));
        assert_eq!(font.missing_chars("你好 x"), 1);
        // Every glyph of the test font advances one em
        assert!((font.string_width("你好", 10.0) - 20.0).abs() < 1e-4);
        assert!((font.ascent() - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_collections_and_garbage_are_rejected() {
        let err = EmbeddedFont::from_bytes(b"ttcf\0\x01\0\0".to_vec()).unwrap_err();
        assert!(matches!(err, Error::FontLoad(_)));
        assert!(EmbeddedFont::from_bytes(b"not a font".to_vec()).is_err());
    }

    #[test]
    fn test_resolve_missing_path_is_an_error() {
        let err = OverlayFont::resolve(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(matches!(err, Error::FontLoad(_)));
    }

    #[test]
    fn test_register_helvetica_keeps_existing_fonts() {
        let mut doc = Document::load_mem(&single_page_pdf("x")).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        assert_eq!(OverlayFont::Helvetica.register(&mut doc, page_id, "x").unwrap(), FONT_RESOURCE);

        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"), "existing fonts are kept");
        assert_eq!(page_font(&doc, page_id).get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }

    #[test]
    fn test_register_embedded_builds_type0_font() {
        let mut doc = Document::load_mem(&single_page_pdf("x")).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();

        cjk_font().register(&mut doc, page_id, "你好").unwrap();

        let type0 = page_font(&doc, page_id);
        assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
        assert_eq!(type0.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");

        let descendants = type0.get(b"DescendantFonts").unwrap().as_array().unwrap();
        let cid = doc.get_dictionary(descendants[0].as_reference().unwrap()).unwrap();
        assert_eq!(cid.get(b"Subtype").unwrap().as_name().unwrap(), b"CIDFontType2");
        // Glyphs 1 and 2 are consecutive: [1 [1000 1000]]
        let widths = cid.get(b"W").unwrap().as_array().unwrap();
        assert_eq!(widths.len(), 2);
        assert_eq!(widths[1].as_array().unwrap().len(), 2);

        let descriptor = doc
            .get_dictionary(cid.get(b"FontDescriptor").unwrap().as_reference().unwrap())
            .unwrap();
        assert!(descriptor.has(b"FontFile2"));

        let to_unicode = doc
            .get_object(type0.get(b"ToUnicode").unwrap().as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        let cmap = String::from_utf8_lossy(&to_unicode.content).into_owned();
        assert!(cmap.contains("2 beginbfchar"), "{cmap}");
        assert!(cmap.contains("<0001> <4F60>"));
        assert!(cmap.contains("<0002> <597D>"));
    }

    #[test]
    fn test_to_unicode_uses_surrogate_pairs() {
        let used = BTreeMap::from([(7u16, (1000i64, '😀'))]);
        let cmap = String::from_utf8(to_unicode_cmap(&used)).unwrap();
        assert!(cmap.contains("<0007> <D83DDE00>"));
    }
}
