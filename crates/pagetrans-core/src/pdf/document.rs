use std::path::Path;
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};

use super::PageSource;
use super::overlay::extract_page;
use super::text::{TextBlock, TextExtractor};
use crate::cache::DocumentIdentity;
use crate::error::{Error, Result};

/// A source PDF held in memory.
///
/// `mupdf` handles are not `Send`, so only the bytes are kept and a fresh
/// handle is opened per operation. Cloning is cheap.
#[derive(Clone)]
pub struct PdfDocument {
    bytes: Arc<Vec<u8>>,
    metadata: DocumentMetadata,
    page_count: usize,
}

/// Info-dictionary fields that take part in the document identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        // mupdf returns an empty string for absent entries
        let get_meta = |name| -> Option<String> { doc.metadata(name).ok().filter(|s| !s.is_empty()) };

        let metadata = DocumentMetadata {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
        };

        Ok(Self {
            bytes: Arc::new(bytes),
            metadata,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::PdfOpen(format!("Failed to read file {}: {}", path.display(), e)))?;
        Self::from_bytes(bytes)
    }

    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl PageSource for PdfDocument {
    fn identity(&self) -> DocumentIdentity {
        DocumentIdentity::new(
            self.metadata.title.as_deref(),
            self.metadata.author.as_deref(),
            self.page_count,
        )
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, page_num: usize) -> Result<String> {
        TextExtractor::new(self).page_text(page_num)
    }

    fn page_blocks(&self, page_num: usize) -> Result<Vec<TextBlock>> {
        TextExtractor::new(self).extract_page_blocks(page_num)
    }

    fn page_pdf(&self, page_num: usize) -> Result<Vec<u8>> {
        extract_page(&self.bytes, page_num)
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::test_support::single_page_pdf;

    #[test]
    fn test_open_garbage_fails() {
        let err = PdfDocument::from_bytes(b"not a pdf".to_vec()).unwrap_err();
        assert!(matches!(err, Error::PdfOpen(_)));
    }

    #[test]
    fn test_identity_without_metadata() {
        let doc = PdfDocument::from_bytes(single_page_pdf("Hallo")).unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.metadata(), &DocumentMetadata::default());
        assert_eq!(doc.identity(), DocumentIdentity::new(None, None, 1));
    }

    #[test]
    fn test_page_text_and_pdf() {
        let doc = PdfDocument::from_bytes(single_page_pdf("Hallo Welt")).unwrap();
        assert!(doc.page_text(0).unwrap().contains("Hallo Welt"));
        assert!(doc.page_text(1).is_err());

        let page = doc.page_pdf(0).unwrap();
        assert_eq!(lopdf::Document::load_mem(&page).unwrap().get_pages().len(), 1);
    }
}
