//! Page-by-page translation with a write-through page cache.
//!
//! Each page moves through [`PageStage`]s:
//!
//! ```text
//! NotStarted -> CacheCheck -> Cached ------------------------> Done
//!                          \-> Translating -> Compositing ---> Done
//! ```
//!
//! Pages are handled strictly in order and the blocks of a page strictly in
//! extraction order. Translation failures never abort a page (see
//! [`RetryingTranslator`]); cache failures never abort a page; extraction
//! and compositing failures of the page as a whole propagate.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, TranslationCache};
use crate::config::AppConfig;
use crate::error::Result;
use crate::pdf::{
    DocumentAssembler, OverlayFont, OverlayOptions, PageSource, PdfOverlay, TranslationOverlay, write_output,
};
use crate::translator::{RetryPolicy, RetryingTranslator, Translator, create_translator};

/// Where a page is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStage {
    NotStarted,
    CacheCheck,
    Translating,
    Compositing,
    Cached,
    Done,
}

impl std::fmt::Display for PageStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::CacheCheck => "cache-check",
            Self::Translating => "translating",
            Self::Compositing => "compositing",
            Self::Cached => "cached",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Result of translating a single page
#[derive(Debug, Clone)]
pub struct TranslatedPage {
    /// Page number (0-indexed)
    pub page_num: usize,
    /// Translated PDF bytes (single page)
    pub pdf_bytes: Vec<u8>,
    /// Whether this was a cache hit
    pub from_cache: bool,
    /// Blocks translated for this page; empty on a cache hit
    pub blocks: Vec<TranslationOverlay>,
}

/// Reported after every finished page of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub page_num: usize,
    /// Pages finished so far in this range, including this one
    pub completed: usize,
    /// Pages in this range
    pub total: usize,
    pub from_cache: bool,
}

/// Orchestrates fingerprinting, cache lookup, translation, compositing and
/// cache write-through for each page.
///
/// Holds no per-document state: the same pipeline can serve any number of
/// sources, and everything it learns lives in the cache.
pub struct PageTranslationPipeline {
    translator: RetryingTranslator,
    cache: TranslationCache,
    overlay: PdfOverlay,
    config: AppConfig,
    refresh: bool,
}

impl PageTranslationPipeline {
    /// Build the translator, overlay font and cache described by `config`.
    ///
    /// Fails before any page work when the translator is misconfigured
    /// (e.g. `chatgpt` without an API key) or `font_path` is unusable.
    /// Without `font_path`, common system fonts are searched.
    pub fn new(config: AppConfig) -> Result<Self> {
        let translator = create_translator(&config.translator)?;
        let font = OverlayFont::resolve(config.font_path.as_deref())?;
        Ok(Self::build(translator, config, font))
    }

    /// Use a custom translation backend; retries still follow `config`.
    ///
    /// Draws with `font_path` when it loads, Helvetica otherwise.
    pub fn with_translator(translator: Arc<dyn Translator>, config: AppConfig) -> Self {
        let font = match config.font_path.as_deref() {
            Some(path) => OverlayFont::resolve(Some(path)).unwrap_or_else(|e| {
                warn!("{}, overlays fall back to Helvetica", e);
                OverlayFont::Helvetica
            }),
            None => OverlayFont::Helvetica,
        };
        Self::build(translator, config, font)
    }

    fn build(translator: Arc<dyn Translator>, config: AppConfig, font: OverlayFont) -> Self {
        let policy = RetryPolicy::from_config(&config.translator);
        let cache = TranslationCache::new(&config.cache);
        let overlay = PdfOverlay::new(OverlayOptions {
            text_color: config.text_color,
            font_size: None,
        })
        .with_font(font);

        Self {
            translator: RetryingTranslator::new(translator, policy),
            cache,
            overlay,
            config,
            refresh: false,
        }
    }

    /// Replace the cache built from the configuration.
    #[must_use]
    pub fn with_cache(mut self, cache: TranslationCache) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the overlay font.
    #[must_use]
    pub fn with_font(mut self, font: OverlayFont) -> Self {
        self.overlay = self.overlay.with_font(font);
        self
    }

    /// Ignore cached pages in ranges (they are still overwritten).
    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translator label that goes into cache keys.
    pub fn translator_name(&self) -> &'static str {
        self.translator.name()
    }

    /// Cache key of a page under the current translator and target language.
    pub fn cache_key<S: PageSource + ?Sized>(&self, source: &S, page_num: usize) -> Result<CacheKey> {
        let text = source.page_text(page_num)?;
        Ok(self.key_for_text(source, page_num, &text))
    }

    fn key_for_text<S: PageSource + ?Sized>(&self, source: &S, page_num: usize, text: &str) -> CacheKey {
        CacheKey::fingerprint(
            &source.identity(),
            page_num,
            self.translator_name(),
            &self.config.target_lang,
            text,
        )
    }

    /// Translate one page, serving it from the cache when possible.
    pub async fn translate_page<S: PageSource + ?Sized>(&self, source: &S, page_num: usize) -> Result<TranslatedPage> {
        self.translate_page_force(source, page_num, false).await
    }

    /// Translate one page; with `force` the cache is not consulted but the
    /// fresh result is still written through.
    pub async fn translate_page_force<S: PageSource + ?Sized>(
        &self,
        source: &S,
        page_num: usize,
        force: bool,
    ) -> Result<TranslatedPage> {
        let mut stage = PageStage::NotStarted;
        advance(&mut stage, PageStage::CacheCheck, page_num);

        let text = source.page_text(page_num)?;
        let key = self.key_for_text(source, page_num, &text);

        if force {
            debug!("Page {}: refresh requested, skipping cache read", page_num + 1);
        } else if let Some(pdf_bytes) = self.cache.get(&key).await {
            advance(&mut stage, PageStage::Cached, page_num);
            info!("Cache hit for page {}", page_num + 1);
            advance(&mut stage, PageStage::Done, page_num);
            return Ok(TranslatedPage {
                page_num,
                pdf_bytes,
                from_cache: true,
                blocks: Vec::new(),
            });
        } else {
            info!("Cache miss for page {}, translating", page_num + 1);
        }

        advance(&mut stage, PageStage::Translating, page_num);
        let blocks = self.translate_blocks(source, page_num).await?;

        advance(&mut stage, PageStage::Compositing, page_num);
        let page_pdf = source.page_pdf(page_num)?;
        let pdf_bytes = self.overlay.apply_overlays(&page_pdf, 0, &blocks)?;

        if let Err(e) = self.cache.put(&key, pdf_bytes.clone()).await {
            warn!("Page {} translated but not cached: {}", page_num + 1, e);
        }
        advance(&mut stage, PageStage::Done, page_num);

        Ok(TranslatedPage {
            page_num,
            pdf_bytes,
            from_cache: false,
            blocks,
        })
    }

    async fn translate_blocks<S: PageSource + ?Sized>(
        &self,
        source: &S,
        page_num: usize,
    ) -> Result<Vec<TranslationOverlay>> {
        let blocks = source.page_blocks(page_num)?;
        debug!("Page {}: {} text blocks", page_num + 1, blocks.len());

        let mut overlays = Vec::with_capacity(blocks.len());
        for block in blocks {
            if block.text.trim().is_empty() {
                continue;
            }
            let translated = self
                .translator
                .translate_or_original(&block.text, &self.config.source_lang, &self.config.target_lang)
                .await;
            overlays.push(TranslationOverlay {
                bbox: block.bbox,
                original: block.text,
                translated,
                font_size: block.font_size,
            });
        }
        Ok(overlays)
    }

    /// Translate `count` pages starting at `start` (0-based), in order.
    ///
    /// Yields `min(count, page_count - start)` pages; a `start` past the end
    /// yields none. `progress` is called after each page.
    pub async fn translate_range<S, F>(
        &self,
        source: &S,
        start: usize,
        count: usize,
        mut progress: F,
    ) -> Result<Vec<TranslatedPage>>
    where
        S: PageSource + ?Sized,
        F: FnMut(PageProgress),
    {
        let page_count = source.page_count();
        if start >= page_count {
            debug!("Start page {} is past the last page ({})", start + 1, page_count);
            return Ok(Vec::new());
        }

        let end = start.saturating_add(count).min(page_count);
        let total = end - start;
        info!("Translating pages {}-{} of {}", start + 1, end, page_count);

        let mut pages = Vec::with_capacity(total);
        for page_num in start..end {
            let page = self.translate_page_force(source, page_num, self.refresh).await?;
            progress(PageProgress {
                page_num,
                completed: pages.len() + 1,
                total,
                from_cache: page.from_cache,
            });
            pages.push(page);
        }

        let hits = pages.iter().filter(|p| p.from_cache).count();
        if hits > 0 {
            info!("Used cache for {} out of {} pages", hits, total);
        }
        Ok(pages)
    }

    /// Translate every page and assemble the output document.
    pub async fn translate_document<S, F>(&self, source: &S, progress: F) -> Result<Vec<u8>>
    where
        S: PageSource + ?Sized,
        F: FnMut(PageProgress),
    {
        let pages = self.translate_range(source, 0, source.page_count(), progress).await?;
        DocumentAssembler::new().assemble(&pages)
    }

    /// [`Self::translate_document`], then write the result to `path`,
    /// replacing any previous output.
    pub async fn translate_document_to<S, F>(&self, source: &S, path: impl AsRef<Path>, progress: F) -> Result<()>
    where
        S: PageSource + ?Sized,
        F: FnMut(PageProgress),
    {
        let bytes = self.translate_document(source, progress).await?;
        write_output(path, &bytes)
    }
}

impl std::fmt::Debug for PageTranslationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTranslationPipeline")
            .field("translator", &self.translator)
            .field("target_lang", &self.config.target_lang)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

fn advance(stage: &mut PageStage, next: PageStage, page_num: usize) {
    debug!("Page {}: {} -> {}", page_num + 1, stage, next);
    *stage = next;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache::DocumentIdentity;
    use crate::config::{CacheConfig, Lang};
    use crate::error::Error;
    use crate::pdf::test_support::{minimal_truetype, single_page_pdf};
    use crate::pdf::{BoundingBox, TextBlock};
    use crate::translator::TranslatorInfo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Upper {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "upper",
                requires_api_key: false,
            }
        }

        async fn translate(&self, text: &str, _source: &Lang, _target: &Lang) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_uppercase())
        }
    }

    /// One page per entry, each with a single block of that text.
    struct Pages(Vec<&'static str>);

    impl PageSource for Pages {
        fn identity(&self) -> DocumentIdentity {
            DocumentIdentity::new(Some("Pages"), None, self.0.len())
        }

        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn page_text(&self, page_num: usize) -> Result<String> {
            self.0.get(page_num).map(|t| format!("{t}\n")).ok_or(Error::PdfInvalidPage {
                page: page_num,
                total: self.0.len(),
            })
        }

        fn page_blocks(&self, page_num: usize) -> Result<Vec<TextBlock>> {
            let text = self.page_text(page_num)?;
            Ok(vec![
                TextBlock {
                    text: text.trim().to_string(),
                    bbox: BoundingBox::new(100.0, 70.0, 300.0, 98.0),
                    font_size: 24.0,
                    line_count: 1,
                },
                TextBlock {
                    text: "  ".into(),
                    bbox: BoundingBox::new(100.0, 200.0, 300.0, 220.0),
                    font_size: 12.0,
                    line_count: 1,
                },
            ])
        }

        fn page_pdf(&self, page_num: usize) -> Result<Vec<u8>> {
            Ok(single_page_pdf(self.0[page_num]))
        }
    }

    fn pipeline(cache_dir: &Path) -> (PageTranslationPipeline, Arc<Upper>) {
        let upper = Arc::new(Upper {
            calls: AtomicUsize::new(0),
        });
        let config = AppConfig {
            cache: CacheConfig {
                memory_enabled: false,
                disk_path: Some(cache_dir.to_path_buf()),
                ..CacheConfig::default()
            },
            ..AppConfig::default()
        };
        let translator: Arc<dyn Translator> = upper.clone();
        (PageTranslationPipeline::with_translator(translator, config), upper)
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PageStage::CacheCheck.to_string(), "cache-check");
        assert_eq!(PageStage::Done.to_string(), "done");
    }

    #[tokio::test]
    async fn test_blank_blocks_are_not_translated() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, upper) = pipeline(tmp.path());

        let page = pipeline.translate_page(&Pages(vec!["Hallo"]), 0).await.unwrap();
        assert!(!page.from_cache);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].translated, "HALLO");
        assert_eq!(upper.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_skips_read_but_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, upper) = pipeline(tmp.path());
        let source = Pages(vec!["Hallo"]);

        pipeline.translate_page(&source, 0).await.unwrap();
        let forced = pipeline.translate_page_force(&source, 0, true).await.unwrap();
        assert!(!forced.from_cache);
        assert_eq!(upper.calls.load(Ordering::SeqCst), 2);

        let cached = pipeline.translate_page(&source, 0).await.unwrap();
        assert!(cached.from_cache);
        assert!(cached.blocks.is_empty());
        assert_eq!(upper.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_applies_to_ranges() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, upper) = pipeline(tmp.path());
        let source = Pages(vec!["Eins", "Zwei"]);

        pipeline.translate_range(&source, 0, 2, |_| {}).await.unwrap();
        let pipeline = pipeline.with_refresh(true);
        let pages = pipeline.translate_range(&source, 0, 2, |_| {}).await.unwrap();

        assert!(pages.iter().all(|p| !p.from_cache));
        assert_eq!(upper.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_completes_page() {
        let tmp = tempfile::tempdir().unwrap();
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let (pipeline, _) = pipeline(&blocked);

        let page = pipeline.translate_page(&Pages(vec!["Hallo"]), 0).await.unwrap();
        assert!(!page.from_cache);
        assert!(lopdf::Document::load_mem(&page.pdf_bytes).is_ok());
    }

    #[tokio::test]
    async fn test_progress_reports_each_page() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(tmp.path());
        let source = Pages(vec!["Eins", "Zwei", "Drei"]);

        let mut seen = Vec::new();
        pipeline
            .translate_range(&source, 1, 5, |p| seen.push((p.page_num, p.completed, p.total)))
            .await
            .unwrap();
        assert_eq!(seen, vec![(1, 1, 2), (2, 2, 2)]);
    }

    #[tokio::test]
    async fn test_extraction_error_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(tmp.path());
        let err = pipeline.translate_page(&Pages(vec!["Hallo"]), 4).await.unwrap_err();
        assert!(matches!(err, Error::PdfInvalidPage { page: 4, total: 1 }));
    }

    #[tokio::test]
    async fn test_configured_font_draws_non_latin_text() {
        let tmp = tempfile::tempdir().unwrap();
        let font_path = tmp.path().join("cjk.ttf");
        std::fs::write(&font_path, minimal_truetype(&['你', '好', '世', '界'])).unwrap();

        let upper = Arc::new(Upper {
            calls: AtomicUsize::new(0),
        });
        let config = AppConfig {
            cache: CacheConfig::disabled(),
            font_path: Some(font_path),
            ..AppConfig::default()
        };
        let pipeline = PageTranslationPipeline::with_translator(upper, config);

        let page = pipeline.translate_page(&Pages(vec!["你好世界"]), 0).await.unwrap();
        let doc = lopdf::Document::load_mem(&page.pdf_bytes).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();

        assert!(content.contains("<0001000200030004> Tj"), "{content}");
        assert!(!content.contains("<3F3F3F3F>"));
    }

    #[test]
    fn test_unusable_font_path_fails_construction() {
        let config = AppConfig {
            font_path: Some("/nonexistent/overlay.ttf".into()),
            ..AppConfig::default()
        };
        let err = PageTranslationPipeline::new(config).unwrap_err();
        assert!(matches!(err, Error::FontLoad(_)));
    }

    #[tokio::test]
    async fn test_key_uses_translator_label() {
        let tmp = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(tmp.path());
        let key = pipeline.cache_key(&Pages(vec!["Hallo"]), 0).unwrap();
        assert!(key.as_str().ends_with("_page0_upper_en.pdf"));
    }
}
