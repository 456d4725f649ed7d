//! Page-by-page PDF translation core.
//!
//! - Text extraction, compositing, rasterizing and assembly of PDFs
//! - Translation via OpenAI-compatible chat APIs, with bounded retries and
//!   fallback to the original text
//! - A content-addressed page cache (memory and disk), so a page is only
//!   translated once per document identity, text, translator and target
//!   language
//!
//! ```no_run
//! use pagetrans_core::{AppConfig, PageTranslationPipeline, PdfDocument};
//!
//! # async fn run() -> pagetrans_core::Result<()> {
//! let pipeline = PageTranslationPipeline::new(AppConfig::load())?;
//! let doc = PdfDocument::from_file("paper.pdf")?;
//! pipeline
//!     .translate_document_to(&doc, "translated_paper.pdf", |p| {
//!         println!("page {} done ({}/{})", p.page_num + 1, p.completed, p.total);
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod translator;
pub mod util;

pub use cache::{CacheKey, DocumentIdentity, TranslationCache};
pub use config::{
    AppConfig, CacheConfig, DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG, Lang,
    TextColor, TranslatorConfig, TranslatorKind,
};
pub use error::{Error, FailureKind, Result};
pub use pdf::{
    BoundingBox, DocumentAssembler, EmbeddedFont, OverlayFont, PageRenderer, PageSource, PdfDocument, PdfOverlay,
    TextBlock, TranslationOverlay, default_output_path, write_output,
};
pub use pipeline::{PageProgress, PageStage, PageTranslationPipeline, TranslatedPage};
pub use translator::{OpenAiTranslator, RetryPolicy, RetryingTranslator, Translator, TranslatorInfo, create_translator};
