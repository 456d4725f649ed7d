//! Merging per-page artifacts into the output document.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pipeline::TranslatedPage;

/// Page attributes a Page may inherit from its Pages ancestors.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Prefix of the output file name.
pub const OUTPUT_PREFIX: &str = "translated_";

/// Concatenates translated pages and compacts the result.
#[derive(Debug, Clone, Copy)]
pub struct DocumentAssembler {
    compact: bool,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler {
    pub const fn new() -> Self {
        Self { compact: true }
    }

    /// Skip the compaction pass.
    pub const fn without_compaction() -> Self {
        Self { compact: false }
    }

    /// Concatenate pages in the given order and compact the result.
    ///
    /// A failed compaction is logged and the uncompacted document returned.
    pub fn assemble(&self, pages: &[TranslatedPage]) -> Result<Vec<u8>> {
        let parts: Vec<&[u8]> = pages.iter().map(|p| p.pdf_bytes.as_slice()).collect();
        self.assemble_bytes(&parts)
    }

    /// Same as [`Self::assemble`] for raw single-page PDFs.
    pub fn assemble_bytes(&self, parts: &[&[u8]]) -> Result<Vec<u8>> {
        if parts.is_empty() {
            return Err(Error::PdfAssemble("No pages to combine".to_string()));
        }

        let mut combined = concatenate(parts)?;
        let page_count = combined.get_pages().len();

        let mut plain = Vec::new();
        combined
            .save_to(&mut plain)
            .map_err(|e| Error::PdfSave(format!("Failed to save combined PDF: {e}")))?;

        if !self.compact {
            return Ok(plain);
        }

        match compact(&plain, page_count) {
            Ok(compacted) => {
                debug!("Compacted output from {} to {} bytes", plain.len(), compacted.len());
                Ok(compacted)
            }
            Err(e) => {
                warn!("Compaction failed, writing uncompacted output: {}", e);
                Ok(plain)
            }
        }
    }
}

/// Merge documents into one page tree, preserving page order.
fn concatenate(parts: &[&[u8]]) -> Result<Document> {
    let mut max_id: u32 = 1;
    let mut page_order: Vec<ObjectId> = Vec::new();
    let mut page_objects: BTreeMap<ObjectId, Dictionary> = BTreeMap::new();
    let mut other_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (i, bytes) in parts.iter().enumerate() {
        let mut doc = Document::load_mem(bytes)
            .map_err(|e| Error::PdfAssemble(format!("Failed to load page {}: {}", i + 1, e)))?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let page = flatten_inherited(&doc, page_id)
                .map_err(|e| Error::PdfAssemble(format!("Page {}: {}", i + 1, e)))?;
            page_order.push(page_id);
            page_objects.insert(page_id, page);
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    other_objects.insert(object_id, object);
                }
            }
        }
    }

    let mut document = Document::with_version("1.5");
    document.objects.extend(other_objects);
    document.max_id = max_id;

    let pages_id = document.new_object_id();
    for (page_id, mut page) in page_objects {
        page.set("Parent", Object::Reference(pages_id));
        document.objects.insert(page_id, Object::Dictionary(page));
    }

    let kids: Vec<Object> = page_order.iter().map(|&id| Object::Reference(id)).collect();
    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    document.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = document.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    document.trailer.set("Root", Object::Reference(catalog_id));
    document.renumber_objects();

    Ok(document)
}

/// Copy of a page dictionary with inherited attributes made explicit, since
/// the source Pages nodes are dropped.
fn flatten_inherited(doc: &Document, page_id: ObjectId) -> std::result::Result<Dictionary, lopdf::Error> {
    let mut page = doc.get_dictionary(page_id)?.clone();

    for key in INHERITABLE {
        if page.has(key) {
            continue;
        }
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        // Depth limit guards against Parent cycles in malformed files
        for _ in 0..16 {
            let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
                break;
            };
            if let Ok(value) = node.get(key) {
                page.set(key.to_vec(), value.clone());
                break;
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    Ok(page)
}

/// Drop unreachable objects and empty streams, compress, renumber.
fn compact(bytes: &[u8], expected_pages: usize) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(bytes).map_err(|e| Error::PdfAssemble(format!("Failed to reload: {e}")))?;

    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    doc.renumber_objects();

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| Error::PdfSave(format!("Failed to save compacted PDF: {e}")))?;

    let check = Document::load_mem(&output)
        .map_err(|e| Error::PdfAssemble(format!("Compacted output does not parse: {e}")))?;
    let pages = check.get_pages().len();
    if pages != expected_pages {
        return Err(Error::PdfAssemble(format!(
            "Compacted output has {pages} pages, expected {expected_pages}"
        )));
    }

    Ok(output)
}

/// Write the output document, replacing any existing file atomically.
pub fn write_output(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| Error::PdfSave(format!("Failed to create temp file in {}: {}", dir.display(), e)))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::PdfSave(format!("Failed to write {}: {}", path.display(), e)))?;
    tmp.persist(path)
        .map_err(|e| Error::PdfSave(format!("Failed to replace {}: {}", path.display(), e.error)))?;

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// `translated_{file name}` in the working directory.
pub fn default_output_path(input: impl AsRef<Path>) -> PathBuf {
    let name = input
        .as_ref()
        .file_name()
        .map_or_else(|| "output.pdf".into(), |n| n.to_string_lossy());
    PathBuf::from(format!("{OUTPUT_PREFIX}{name}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::test_support::single_page_pdf;

    fn page_texts(pdf: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = DocumentAssembler::new().assemble(&[]).unwrap_err();
        assert!(matches!(err, Error::PdfAssemble(_)));
    }

    #[test]
    fn test_order_is_preserved() {
        let parts: Vec<Vec<u8>> = ["Eins", "Zwei", "Drei"].iter().map(|t| single_page_pdf(t)).collect();
        let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();

        for assembler in [DocumentAssembler::new(), DocumentAssembler::without_compaction()] {
            let out = assembler.assemble_bytes(&refs).unwrap();
            let texts = page_texts(&out);
            assert_eq!(texts.len(), 3);
            assert!(texts[0].contains("Eins"));
            assert!(texts[1].contains("Zwei"));
            assert!(texts[2].contains("Drei"));
        }
    }

    #[test]
    fn test_single_page_is_valid() {
        let part = single_page_pdf("Eins");
        let out = DocumentAssembler::new().assemble_bytes(&[part.as_slice()]).unwrap();
        assert_eq!(page_texts(&out).len(), 1);
    }

    #[test]
    fn test_inherited_resources_survive() {
        let mut doc = Document::load_mem(&single_page_pdf("Eins")).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let parent_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Parent")
            .unwrap()
            .as_reference()
            .unwrap();
        let media_box = doc.get_dictionary_mut(page_id).unwrap().remove(b"MediaBox").unwrap();
        doc.get_dictionary_mut(parent_id).unwrap().set("MediaBox", media_box);
        let mut part = Vec::new();
        doc.save_to(&mut part).unwrap();

        let out = DocumentAssembler::new().assemble_bytes(&[part.as_slice()]).unwrap();
        let out = Document::load_mem(&out).unwrap();
        let page = out.get_dictionary(*out.get_pages().get(&1).unwrap()).unwrap();
        assert!(page.has(b"MediaBox"));
    }

    #[test]
    fn test_garbage_page_is_an_error() {
        let err = DocumentAssembler::new().assemble_bytes(&[b"garbage".as_slice()]).unwrap_err();
        assert!(matches!(err, Error::PdfAssemble(_)));
    }

    #[test]
    fn test_write_output_replaces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("translated_doc.pdf");
        std::fs::write(&path, b"old").unwrap();

        write_output(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path("/home/me/papers/Bericht.pdf"),
            PathBuf::from("translated_Bericht.pdf")
        );
        assert_eq!(default_output_path("a.pdf"), PathBuf::from("translated_a.pdf"));
    }
}
