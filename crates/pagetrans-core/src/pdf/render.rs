use image::{ImageEncoder, RgbaImage};
use mupdf::{Colorspace, Matrix};

use super::document::PdfDocument;
use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// Default scale factor for rendering (2.0 for high DPI)
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Rasterizes pages for preview.
pub struct PageRenderer<'a> {
    pub doc: &'a PdfDocument,
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    pub const fn with_scale(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Render a page to an RGBA image buffer
    pub fn render_page(&self, page_num: usize) -> Result<RgbaImage> {
        let render_err = |reason: String| Error::PdfRender { page: page_num, reason };
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc
            .load_page(page_index.into())
            .map_err(|e| render_err(format!("Failed to load page: {e}")))?;

        let matrix = Matrix::new_scale(self.scale, self.scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| render_err(format!("Failed to render: {e}")))?;

        let n = pixmap.n() as usize;
        let mut rgba = Vec::with_capacity(pixmap.samples().len() / n.max(1) * 4);
        for chunk in pixmap.samples().chunks(n.max(1)) {
            match *chunk {
                [r, g, b] => rgba.extend_from_slice(&[r, g, b, 255]),
                [r, g, b, a] => rgba.extend_from_slice(&[r, g, b, a]),
                [v] => rgba.extend_from_slice(&[v, v, v, 255]),
                _ => return Err(render_err(format!("Unexpected pixel format with {n} components"))),
            }
        }

        RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba)
            .ok_or_else(|| render_err("Failed to create image buffer".to_string()))
    }

    /// Render a page to PNG bytes
    pub fn render_page_png(&self, page_num: usize) -> Result<Vec<u8>> {
        let img = self.render_page(page_num)?;

        let mut png_data = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new_with_quality(
            &mut png_data,
            image::codecs::png::CompressionType::Fast,
            image::codecs::png::FilterType::Adaptive,
        );
        encoder
            .write_image(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgba8)
            .map_err(|e| Error::PdfRender {
                page: page_num,
                reason: format!("Failed to encode PNG: {e}"),
            })?;

        Ok(png_data)
    }
}
