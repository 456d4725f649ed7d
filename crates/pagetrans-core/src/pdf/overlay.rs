//! Compositing translated text over a page with `lopdf`.
//!
//! # Coordinate System
//!
//! Extraction (mupdf) reports boxes with a **top-left origin** and y growing
//! downward. PDF content streams use a **bottom-left origin**. Boxes are
//! converted with:
//! ```text
//! pdf_y = media_box_top - mupdf_y
//! ```
//!
//! # Overlay Strategy
//!
//! Two phases so overlapping boxes never erase each other's text:
//! 1. Fill every valid block's box with opaque white.
//! 2. Draw each translation wrapped and shrunk to fit its box, clipped to it.
//!
//! The page's original content is wrapped in `q`/`Q` so graphics state it
//! leaves behind cannot leak into the overlay.

use std::fmt::Write;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::font::{FONT_RESOURCE, OverlayFont};
use super::page_index::PageIndex;
use super::text::BoundingBox;
use crate::config::TextColor;
use crate::error::{Error, Result};

/// Line height as a multiple of font size.
const LINE_HEIGHT_FACTOR: f32 = 1.15;

/// Smallest size text is shrunk to before it is left to the clip.
pub const MIN_FONT_SIZE: f32 = 4.0;

/// Largest size a block starts from.
const MAX_FONT_SIZE: f32 = 36.0;

/// Shrink step while fitting.
const FONT_SIZE_STEP: f32 = 0.5;

/// Horizontal inset of text inside its box.
const TEXT_INSET: f32 = 1.0;

/// Options for PDF overlay creation
#[derive(Debug, Clone, Default)]
pub struct OverlayOptions {
    pub text_color: TextColor,
    /// Fixed starting size; `None` starts from each block's own size
    pub font_size: Option<f32>,
}

/// A translated block to composite onto a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOverlay {
    /// Where the source text was, in extraction coordinates
    pub bbox: BoundingBox,
    pub original: String,
    pub translated: String,
    /// Size of the source text, the starting point for fitting
    pub font_size: f32,
}

/// Text laid out inside one box.
#[derive(Debug, Clone, PartialEq)]
struct BlockLayout {
    font_size: f32,
    lines: Vec<String>,
}

impl BlockLayout {
    fn line_height(&self) -> f32 {
        self.font_size * LINE_HEIGHT_FACTOR
    }
}

/// PDF overlay creator using lopdf.
#[derive(Debug, Clone, Default)]
pub struct PdfOverlay {
    pub options: OverlayOptions,
    font: OverlayFont,
}

impl PdfOverlay {
    pub fn new(options: OverlayOptions) -> Self {
        Self {
            options,
            font: OverlayFont::default(),
        }
    }

    /// Draw with `font` instead of Helvetica.
    #[must_use]
    pub fn with_font(mut self, font: OverlayFont) -> Self {
        self.font = font;
        self
    }

    pub const fn font(&self) -> &OverlayFont {
        &self.font
    }

    /// Composite `overlays` onto page `page_num` of `pdf_bytes` and return
    /// the modified document.
    ///
    /// Blocks with unusable boxes are logged and skipped; the rest of the
    /// page still renders.
    pub fn apply_overlays(&self, pdf_bytes: &[u8], page_num: usize, overlays: &[TranslationOverlay]) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf_bytes).map_err(|e| Error::PdfComposite {
            page: page_num,
            reason: format!("Failed to load PDF: {e}"),
        })?;

        let pages = doc.get_pages();
        let page_index = PageIndex::try_from_page_num(page_num, pages.len())?;
        let page_id = *pages
            .get(&page_index.as_lopdf_page_number())
            .ok_or(Error::PdfInvalidPage {
                page: page_num,
                total: pages.len(),
            })?;

        let media_box = get_media_box(&doc, page_id);
        let drawable: Vec<&TranslationOverlay> = overlays
            .iter()
            .filter(|o| Self::is_drawable(o, &media_box, page_num))
            .collect();

        if drawable.is_empty() {
            debug!("Page {}: nothing to composite", page_num + 1);
        } else {
            let composite_err = |e: lopdf::Error| Error::PdfComposite {
                page: page_num,
                reason: e.to_string(),
            };

            for overlay in &drawable {
                let missing = self.font.missing_chars(&overlay.translated);
                if missing > 0 {
                    warn!(
                        "Page {}: overlay font has no glyph for {} characters of '{}'",
                        page_num + 1,
                        missing,
                        crate::util::preview(&overlay.translated, 40)
                    );
                }
            }

            let drawn: Vec<&str> = drawable.iter().map(|o| o.translated.as_str()).collect();
            self.font
                .register(&mut doc, page_id, &drawn.concat())
                .map_err(composite_err)?;
            let content = self.create_overlay_content(&drawable, &media_box);
            append_content_to_page(&mut doc, page_id, content.into_bytes()).map_err(composite_err)?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save page {}: {}", page_num + 1, e)))?;

        Ok(output)
    }

    fn is_drawable(overlay: &TranslationOverlay, media_box: &[f32; 4], page_num: usize) -> bool {
        let page_width = media_box[2] - media_box[0];
        let page_height = media_box[3] - media_box[1];

        if !overlay.bbox.is_valid() {
            warn!(
                "Page {}: skipping block with degenerate box {:?}",
                page_num + 1,
                overlay.bbox.as_array()
            );
            return false;
        }
        if !overlay.bbox.intersects_page(page_width, page_height) {
            warn!(
                "Page {}: skipping block outside the page {:?}",
                page_num + 1,
                overlay.bbox.as_array()
            );
            return false;
        }
        if overlay.translated.trim().is_empty() {
            return false;
        }
        true
    }

    /// Content stream drawing all overlays; boxes are already validated.
    fn create_overlay_content(&self, overlays: &[&TranslationOverlay], media_box: &[f32; 4]) -> String {
        let top = media_box[3];
        let mut content = String::from("q\n");

        // Phase 1: cover the original text
        content.push_str("1 1 1 rg\n");
        for overlay in overlays {
            let b = overlay.bbox;
            let _ = writeln!(content, "{} {} {} {} re f", b.x0, top - b.y1, b.width(), b.height());
        }

        // Phase 2: translated text, each block clipped to its own box
        let TextColor { r, g, b } = self.options.text_color.clamped();
        for overlay in overlays {
            let bbox = overlay.bbox;
            let start = self.options.font_size.unwrap_or(overlay.font_size);
            let layout = self.layout(&overlay.translated, bbox, start);

            content.push_str("q\n");
            let _ = writeln!(content, "{} {} {} {} re W n", bbox.x0, top - bbox.y1, bbox.width(), bbox.height());
            let _ = writeln!(content, "{r} {g} {b} rg");
            // OCR layers leave invisible mode (3) behind
            content.push_str("0 Tr\n");

            let first_baseline = top - bbox.y0 - layout.font_size * self.font.ascent();
            for (j, line) in layout.lines.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let y = first_baseline - j as f32 * layout.line_height();
                content.push_str("BT\n");
                let _ = writeln!(content, "/{FONT_RESOURCE} {} Tf", layout.font_size);
                let _ = writeln!(content, "{} {} Td", bbox.x0 + TEXT_INSET, y);
                let _ = writeln!(content, "<{}> Tj", self.font.encode_hex(line));
                content.push_str("ET\n");
            }
            content.push_str("Q\n");
        }

        content.push_str("Q\n");
        content
    }

    /// Largest font size (from `start` down to [`MIN_FONT_SIZE`]) at which
    /// the wrapped text fits the box. Falls back to the minimum size and
    /// lets the clip cut the overflow.
    fn layout(&self, text: &str, bbox: BoundingBox, start: f32) -> BlockLayout {
        let max_width = (bbox.width() - 2.0 * TEXT_INSET).max(1.0);
        let mut size = start.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);

        loop {
            let lines = self.wrap(text, max_width, size);
            let layout = BlockLayout { font_size: size, lines };
            #[allow(clippy::cast_precision_loss)]
            let height = layout.lines.len() as f32 * layout.line_height();
            if height <= bbox.height() || size <= MIN_FONT_SIZE {
                return layout;
            }
            size = (size - FONT_SIZE_STEP).max(MIN_FONT_SIZE);
        }
    }

    /// Greedy word wrap by measured width. A word wider than the box (such
    /// as unspaced CJK text) is broken between characters.
    fn wrap(&self, text: &str, max_width: f32, font_size: f32) -> Vec<String> {
        let space = self.font.string_width(" ", font_size);
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in text.split_whitespace() {
            let widths = self.font.char_widths(word, font_size);
            let word_width: f32 = widths.iter().sum();

            if !current.is_empty() && current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }

            current_width = 0.0;
            for (c, width) in word.chars().zip(widths) {
                if !current.is_empty() && current_width + width > max_width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                current.push(c);
                current_width += width;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }
}

/// Copy one page out of a document into a standalone single-page PDF.
pub fn extract_page(pdf_bytes: &[u8], page_num: usize) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| Error::PdfOpen(format!("Failed to load PDF: {e}")))?;

    let pages = doc.get_pages();
    let keep = PageIndex::try_from_page_num(page_num, pages.len())?.as_lopdf_page_number();
    let others: Vec<u32> = pages.keys().copied().filter(|&n| n != keep).collect();

    if !others.is_empty() {
        doc.delete_pages(&others);
        doc.prune_objects();
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save page {}: {}", page_num + 1, e)))?;
    Ok(output)
}

/// Wrap the page's existing content in `q`/`Q` and append `content`.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> lopdf::Result<()> {
    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut overlay = b"Q\n".to_vec();
    overlay.extend(content);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

    let dict = doc.get_dictionary_mut(page_id)?;
    let mut contents = vec![Object::Reference(save_id)];
    match dict.get(b"Contents").ok().cloned() {
        Some(Object::Reference(existing_id)) => contents.push(Object::Reference(existing_id)),
        Some(Object::Array(arr)) => contents.extend(arr),
        _ => {}
    }
    contents.push(Object::Reference(overlay_id));
    dict.set("Contents", Object::Array(contents));

    Ok(())
}

/// Media box of a page, inherited from parent Pages nodes when absent.
fn get_media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let mut node = doc.get_dictionary(page_id).ok();
    // Depth limit guards against Parent cycles in malformed files
    for _ in 0..16 {
        let Some(dict) = node else { break };
        if let Ok(obj) = dict.get(b"MediaBox")
            && let Some(rect) = parse_rect(doc, obj)
        {
            return rect;
        }
        node = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }

    // US Letter
    [0.0, 0.0, 612.0, 792.0]
}

fn parse_rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let arr = match obj {
        Object::Array(arr) => arr,
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        _ => return None,
    };
    let values: Vec<f32> = arr
        .iter()
        .filter_map(|o| match o {
            #[allow(clippy::cast_precision_loss)]
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect();
    <[f32; 4]>::try_from(values).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::EmbeddedFont;
    use crate::pdf::test_support::{minimal_truetype, single_page_pdf};
    use std::sync::Arc;

    fn cjk_font() -> OverlayFont {
        let data = minimal_truetype(&['你', '好', '世', '界']);
        OverlayFont::Embedded(Arc::new(EmbeddedFont::from_bytes(data).unwrap()))
    }

    fn overlay(bbox: BoundingBox, translated: &str) -> TranslationOverlay {
        TranslationOverlay {
            bbox,
            original: "Hallo Welt".into(),
            translated: translated.into(),
            font_size: 24.0,
        }
    }

    fn page_content(pdf: &[u8]) -> String {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn test_wrap_by_width() {
        let o = PdfOverlay::default();
        // "Hello" at 10pt is 22.78pt wide, "Hello world" 49.45pt
        assert_eq!(o.wrap("Hello world", 60.0, 10.0), vec!["Hello world"]);
        assert_eq!(o.wrap("Hello world", 30.0, 10.0), vec!["Hello", "world"]);
        assert!(o.wrap("   ", 30.0, 10.0).is_empty());
    }

    #[test]
    fn test_wrap_breaks_overlong_words_between_chars() {
        let o = PdfOverlay::default();
        let lines = o.wrap("Donaudampfschiff fährt", 40.0, 10.0);
        assert!(lines.len() > 2);
        for line in &lines {
            assert!(o.font.string_width(line, 10.0) <= 40.0, "{line}");
        }
        assert_eq!(lines.concat().replace(' ', ""), "Donaudampfschifffährt");

        // Unspaced CJK at 10pt per glyph
        let o = PdfOverlay::default().with_font(cjk_font());
        assert_eq!(o.wrap("你好世界", 25.0, 10.0), vec!["你好", "世界"]);
    }

    #[test]
    fn test_layout_keeps_size_when_it_fits() {
        let o = PdfOverlay::default();
        let layout = o.layout("Hello", BoundingBox::new(0.0, 0.0, 200.0, 30.0), 12.0);
        assert!((layout.font_size - 12.0).abs() < f32::EPSILON);
        assert_eq!(layout.lines, vec!["Hello"]);
    }

    #[test]
    fn test_layout_shrinks_to_fit() {
        let o = PdfOverlay::default();
        let text = "The quick brown fox jumps over the lazy dog again and again";
        let bbox = BoundingBox::new(0.0, 0.0, 120.0, 30.0);
        let layout = o.layout(text, bbox, 24.0);

        assert!(layout.font_size < 24.0);
        assert!(layout.font_size >= MIN_FONT_SIZE);
        #[allow(clippy::cast_precision_loss)]
        let height = layout.lines.len() as f32 * layout.line_height();
        assert!(height <= bbox.height());
    }

    #[test]
    fn test_layout_stops_at_minimum() {
        let o = PdfOverlay::default();
        let text = "word ".repeat(500);
        let layout = o.layout(&text, BoundingBox::new(0.0, 0.0, 50.0, 10.0), 12.0);
        assert!((layout.font_size - MIN_FONT_SIZE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_apply_overlay_draws_fill_and_text() {
        let pdf = single_page_pdf("Hallo Welt");
        let o = PdfOverlay::new(OverlayOptions {
            text_color: TextColor::new(0.545, 0.0, 0.0),
            font_size: None,
        });
        let bbox = BoundingBox::new(100.0, 70.0, 240.0, 98.0);

        let out = o.apply_overlays(&pdf, 0, &[overlay(bbox, "HELLO WORLD")]).unwrap();
        let content = page_content(&out);

        // White fill of exactly the box, in bottom-left coordinates
        assert!(content.contains("1 1 1 rg\n100 694 140 28 re f"), "{content}");
        assert!(content.contains("100 694 140 28 re W n"));
        assert!(content.contains("0.545 0 0 rg"));
        assert!(content.contains(&format!("<{}> Tj", OverlayFont::Helvetica.encode_hex("HELLO WORLD"))));
        // Original content is still there, wrapped in q/Q
        assert!(content.starts_with("q\n"));
        assert!(content.contains("Hallo Welt"));
    }

    #[test]
    fn test_invalid_blocks_are_skipped() {
        let pdf = single_page_pdf("Hallo Welt");
        let o = PdfOverlay::default();
        let overlays = [
            overlay(BoundingBox::new(100.0, 70.0, 100.0, 98.0), "DEGENERATE"),
            overlay(BoundingBox::new(900.0, 70.0, 950.0, 98.0), "OFFPAGE"),
            overlay(BoundingBox::new(100.0, 70.0, 240.0, 98.0), "KEPT"),
        ];

        let content = page_content(&o.apply_overlays(&pdf, 0, &overlays).unwrap());
        let font = OverlayFont::Helvetica;
        assert!(content.contains(&font.encode_hex("KEPT")));
        assert!(!content.contains(&font.encode_hex("DEGENERATE")));
        assert!(!content.contains(&font.encode_hex("OFFPAGE")));
    }

    #[test]
    fn test_non_latin_translation_uses_embedded_glyphs() {
        let pdf = single_page_pdf("Hallo Welt");
        let o = PdfOverlay::default().with_font(cjk_font());
        let bbox = BoundingBox::new(100.0, 70.0, 240.0, 98.0);

        let out = o.apply_overlays(&pdf, 0, &[overlay(bbox, "你好世界")]).unwrap();
        let content = page_content(&out);

        assert!(content.contains("<0001000200030004> Tj"), "{content}");
        assert!(!content.contains("<3F3F"));

        let doc = Document::load_mem(&out).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let resources = doc.get_dictionary(page_id).unwrap().get(b"Resources").unwrap().as_dict().unwrap();
        let font_ref = resources
            .get(b"Font")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(FONT_RESOURCE.as_bytes())
            .unwrap()
            .as_reference()
            .unwrap();
        let font = doc.get_dictionary(font_ref).unwrap();
        assert_eq!(font.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
    }

    #[test]
    fn test_nothing_drawable_leaves_content_alone() {
        let pdf = single_page_pdf("Hallo Welt");
        let out = PdfOverlay::default()
            .apply_overlays(&pdf, 0, &[overlay(BoundingBox::new(0.0, 0.0, -1.0, 5.0), "X")])
            .unwrap();
        assert!(!page_content(&out).contains("re f"));
    }

    #[test]
    fn test_bad_page_number() {
        let pdf = single_page_pdf("Hallo");
        let err = PdfOverlay::default().apply_overlays(&pdf, 2, &[]).unwrap_err();
        assert!(matches!(err, Error::PdfInvalidPage { page: 2, total: 1 }));
    }

    #[test]
    fn test_media_box_inherited_from_parent() {
        let pdf = single_page_pdf("Hallo");
        let mut doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let parent_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();

        doc.get_dictionary_mut(page_id).unwrap().remove(b"MediaBox");
        doc.get_dictionary_mut(parent_id).unwrap().set(
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
        );

        assert_eq!(get_media_box(&doc, page_id), [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn test_extract_page_keeps_one_page() {
        let pdf = single_page_pdf("Seite");
        let page = extract_page(&pdf, 0).unwrap();
        assert_eq!(Document::load_mem(&page).unwrap().get_pages().len(), 1);
        assert!(extract_page(&pdf, 1).is_err());
    }
}
