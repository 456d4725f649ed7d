use mupdf::{TextPage, TextPageOptions};

use super::document::PdfDocument;
use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// A text block extracted from a PDF page with bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    /// Page-local box, top-left origin
    pub bbox: BoundingBox,
    /// Font size estimated from line height
    pub font_size: f32,
    pub line_count: usize,
}

/// Axis-aligned rectangle in extraction coordinates (origin top-left,
/// y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub const fn as_array(self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    /// Finite and non-degenerate (`x1 > x0`, `y1 > y0`).
    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite()) && self.x1 > self.x0 && self.y1 > self.y0
    }

    /// True when the box overlaps a `width` x `height` page anchored at the origin.
    pub fn intersects_page(&self, width: f32, height: f32) -> bool {
        self.x0 < width && self.x1 > 0.0 && self.y0 < height && self.y1 > 0.0
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Bounding box of a glyph quad.
    pub const fn from_quad(quad: &mupdf::Quad) -> Self {
        let x0 = quad.ul.x.min(quad.ur.x).min(quad.ll.x).min(quad.lr.x);
        let y0 = quad.ul.y.min(quad.ur.y).min(quad.ll.y).min(quad.lr.y);
        let x1 = quad.ul.x.max(quad.ur.x).max(quad.ll.x).max(quad.lr.x);
        let y1 = quad.ul.y.max(quad.ur.y).max(quad.ll.y).max(quad.lr.y);
        Self { x0, y0, x1, y1 }
    }
}

/// Text extraction from PDF pages
pub struct TextExtractor<'a> {
    pub doc: &'a PdfDocument,
    /// Join words broken across line wraps ("exam-" + "ple" -> "example")
    pub dehyphenate: bool,
    /// Blocks with fewer characters are dropped
    pub min_length: usize,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            dehyphenate: true,
            min_length: 1,
        }
    }

    /// Extract paragraph blocks in the order mupdf reports them.
    ///
    /// Each mupdf block is one paragraph; its lines are joined with spaces,
    /// or directly across a trailing hyphen in dehyphenate mode.
    pub fn extract_page_blocks(&self, page_num: usize) -> Result<Vec<TextBlock>> {
        let text_page = self.load_text_page(page_num)?;
        let mut blocks = Vec::new();

        for block in text_page.blocks() {
            let mut block_text = String::new();
            let mut block_bbox: Option<BoundingBox> = None;
            let mut line_heights: Vec<f32> = Vec::new();

            for line in block.lines() {
                let mut line_text = String::new();
                let mut line_bbox: Option<BoundingBox> = None;

                for text_char in line.chars() {
                    if let Some(c) = text_char.char() {
                        line_text.push(c);
                    }
                    let char_bbox = BoundingBox::from_quad(&text_char.quad());
                    line_bbox = Some(line_bbox.map_or(char_bbox, |b| b.union(char_bbox)));
                }

                let line_trimmed = line_text.trim();
                if line_trimmed.is_empty() {
                    continue;
                }
                if let Some(lb) = line_bbox {
                    line_heights.push(lb.height());
                    block_bbox = Some(block_bbox.map_or(lb, |b| b.union(lb)));
                }

                self.join_line(&mut block_text, line_trimmed);
            }

            let text = block_text.trim().to_string();
            if text.is_empty() || text.chars().count() < self.min_length {
                continue;
            }

            if let Some(bbox) = block_bbox {
                #[allow(clippy::cast_precision_loss)] // Line counts are tiny
                let avg_line_height = line_heights.iter().sum::<f32>() / line_heights.len().max(1) as f32;
                // mupdf line boxes run slightly smaller than the visual size
                let font_size = (avg_line_height * 1.18).clamp(6.0, 36.0);

                blocks.push(TextBlock {
                    text,
                    bbox,
                    font_size,
                    line_count: line_heights.len(),
                });
            }
        }

        Ok(blocks)
    }

    /// Plain text of a page, one line per extracted line.
    pub fn page_text(&self, page_num: usize) -> Result<String> {
        let text_page = self.load_text_page(page_num)?;

        let mut all_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                all_text.extend(line.chars().filter_map(|c| c.char()));
                all_text.push('\n');
            }
        }

        Ok(all_text)
    }

    fn join_line(&self, block_text: &mut String, line: &str) {
        if self.dehyphenate && ends_with_break_hyphen(block_text) {
            block_text.pop();
        } else if !block_text.is_empty() {
            block_text.push(' ');
        }
        block_text.push_str(line);
    }

    fn load_text_page(&self, page_num: usize) -> Result<TextPage> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc.load_page(page_index.into()).map_err(|e| Error::PdfTextExtraction {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;

        page.to_text_page(TextPageOptions::empty())
            .map_err(|e| Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to get text page: {e}"),
            })
    }
}

/// A hyphen glued to a word, as left by a line wrap. A free-standing dash
/// ("A -") is punctuation and keeps its space.
fn ends_with_break_hyphen(text: &str) -> bool {
    let mut rev = text.chars().rev();
    matches!(rev.next(), Some('-')) && rev.next().is_some_and(char::is_alphanumeric)
}
