//! PDF capabilities: text extraction, compositing, rasterizing, assembly.
//!
//! Extraction and rasterizing go through `mupdf`; everything that writes PDF
//! structure (overlays, single-page extraction, concatenation) uses `lopdf`.

mod assemble;
mod document;
mod font;
mod overlay;
mod page_index;
mod render;
mod text;

pub use assemble::{DocumentAssembler, default_output_path, write_output};
pub use document::{DocumentMetadata, PdfDocument};
pub use font::{EmbeddedFont, OverlayFont};
pub use overlay::{OverlayOptions, PdfOverlay, TranslationOverlay, extract_page};
pub use page_index::PageIndex;
pub use render::PageRenderer;
pub use text::{BoundingBox, TextBlock, TextExtractor};

use crate::cache::DocumentIdentity;
use crate::error::Result;

/// Read access to a multi-page source document.
///
/// Page numbers are 0-based. Implementations must return the same text for
/// the same page on every call, since that text feeds the cache key.
pub trait PageSource: Send + Sync {
    /// Identity (title, author, page count) used to partition the cache.
    fn identity(&self) -> DocumentIdentity;

    fn page_count(&self) -> usize;

    /// Plain text of a page, for fingerprinting.
    fn page_text(&self, page_num: usize) -> Result<String>;

    /// Text blocks in extraction order.
    fn page_blocks(&self, page_num: usize) -> Result<Vec<TextBlock>>;

    /// The page as a standalone single-page PDF.
    fn page_pdf(&self, page_num: usize) -> Result<Vec<u8>>;
}
