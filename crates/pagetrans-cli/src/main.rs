//! pagetrans - translate PDF documents page by page from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use pagetrans_core::{
    AppConfig, CacheConfig, DocumentAssembler, Lang, PageProgress, PageRenderer, PageTranslationPipeline,
    PdfDocument, TextColor, TranslatedPage, TranslationCache, TranslatorKind, default_output_path, write_output,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TranslatorOption {
    /// OpenAI-compatible API (local or remote), key optional
    Openai,
    /// Hosted ChatGPT, key required
    Chatgpt,
}

impl From<TranslatorOption> for TranslatorKind {
    fn from(opt: TranslatorOption) -> Self {
        match opt {
            TranslatorOption::Openai => Self::OpenAi,
            TranslatorOption::Chatgpt => Self::ChatGpt,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    #[value(alias = "darkred")]
    DarkRed,
    Black,
    Blue,
    #[value(alias = "darkgreen")]
    DarkGreen,
    Purple,
}

impl From<ColorOption> for TextColor {
    fn from(opt: ColorOption) -> Self {
        match opt {
            ColorOption::DarkRed => Self::dark_red(),
            ColorOption::Black => Self::black(),
            ColorOption::Blue => Self::blue(),
            ColorOption::DarkGreen => Self::dark_green(),
            ColorOption::Purple => Self::purple(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pagetrans")]
#[command(author, version, about = "Translate PDF documents page by page", long_about = None)]
struct Args {
    /// Input PDF file
    #[arg(required_unless_present = "clear_cache")]
    input: Option<PathBuf>,

    /// Output PDF file (default: translated_<input name> in the working directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Translation backend [default: openai]
    #[arg(long, value_enum)]
    translator: Option<TranslatorOption>,

    /// API base URL [default: http://localhost:11434/v1]
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// API key (optional for local models)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model name [default: gemma3:12b]
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Source language code ("auto" to detect) [default: de]
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language code [default: en]
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Translation text color [default: dark-red]
    #[arg(long, value_enum)]
    color: Option<ColorOption>,

    /// TrueType/OpenType font for translated text (default: a system font with broad coverage)
    #[arg(long, env = "PAGETRANS_FONT")]
    font: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First page to translate (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    start: u64,

    /// Number of pages to translate (default: to the end)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    count: Option<u64>,

    /// Disable caching
    #[arg(long, conflicts_with = "refresh")]
    no_cache: bool,

    /// Retranslate cached pages and overwrite their cache entries
    #[arg(long)]
    refresh: bool,

    /// Cache directory (default: .cached)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Write a PNG preview of every translated page into this directory
    #[arg(long)]
    preview_dir: Option<PathBuf>,

    /// Delete all cached pages (then translate INPUT, if given)
    #[arg(long)]
    clear_cache: bool,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Configuration file (or defaults) overridden by the flags actually given.
    fn build_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path).context("Failed to load config file")?,
            None => AppConfig::load(),
        };

        if let Some(source) = &self.source {
            config.source_lang = Lang::new(source);
        }
        if let Some(target) = &self.target {
            config.target_lang = Lang::new(target);
        }
        if let Some(color) = self.color {
            config.text_color = color.into();
        }
        if let Some(font) = &self.font {
            config.font_path = Some(font.clone());
        }

        let translator = &mut config.translator;
        if let Some(kind) = self.translator {
            translator.kind = kind.into();
        }
        if let Some(api_base) = &self.api_base {
            translator.api_base.clone_from(api_base);
        }
        if let Some(model) = &self.model {
            translator.model.clone_from(model);
        }
        if let Some(key) = self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            translator.api_key = Some(key.to_string());
        }

        if let Some(dir) = &self.cache_dir {
            config.cache.disk_path = Some(dir.clone());
        }
        if self.no_cache {
            config.cache = CacheConfig::disabled();
        }

        Ok(config)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(u64::try_from(len).unwrap_or(u64::MAX));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn write_previews(dir: &Path, pages: &[TranslatedPage], scale: f32) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for page in pages {
        let doc = PdfDocument::from_bytes(page.pdf_bytes.clone())
            .with_context(|| format!("Failed to reopen translated page {}", page.page_num + 1))?;
        let png = PageRenderer::with_scale(&doc, scale)
            .render_page_png(0)
            .with_context(|| format!("Failed to render page {}", page.page_num + 1))?;

        let path = dir.join(format!("page_{}.png", page.page_num + 1));
        std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!("Wrote {} previews to {}", pages.len(), dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing so .env can back the env-derived flags
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.build_config()?;

    if args.clear_cache {
        let removed = TranslationCache::new(&config.cache)
            .clear()
            .context("Failed to clear cache")?;
        #[allow(clippy::print_stdout)]
        {
            println!("Removed {removed} cached pages");
        }
    }

    let Some(input) = args.input.as_deref() else {
        return Ok(());
    };

    // Configuration errors surface here, before any page work
    let pipeline = PageTranslationPipeline::new(config.clone())
        .context("Failed to initialize translator")?
        .with_refresh(args.refresh);

    info!("Loading PDF: {}", input.display());
    let doc = PdfDocument::from_file(input).with_context(|| format!("Failed to load PDF: {}", input.display()))?;
    let total_pages = doc.page_count();
    info!("Document has {} pages", total_pages);

    let start = usize::try_from(args.start - 1).context("Start page out of range")?;
    let count = match args.count {
        Some(n) => usize::try_from(n).context("Page count out of range")?,
        None => total_pages.saturating_sub(start),
    };
    if start >= total_pages {
        anyhow::bail!(
            "Start page {} is beyond the end of the document ({} pages)",
            args.start,
            total_pages
        );
    }

    let pb = progress_bar(count.min(total_pages - start))?;
    let on_page = |p: PageProgress| {
        if p.from_cache {
            pb.set_message(format!("page {} (cached)", p.page_num + 1));
        } else {
            pb.set_message(format!("page {}", p.page_num + 1));
        }
        pb.inc(1);
    };

    let pages = pipeline
        .translate_range(&doc, start, count, on_page)
        .await
        .context("Translation failed")?;
    pb.finish_and_clear();

    let cached = pages.iter().filter(|p| p.from_cache).count();
    if cached > 0 {
        info!("Used cache for {} out of {} pages", cached, pages.len());
    }

    if let Some(dir) = &args.preview_dir
        && let Err(e) = write_previews(dir, &pages, config.render_scale)
    {
        warn!("Preview rendering failed: {:#}", e);
    }

    let output_bytes = DocumentAssembler::new()
        .assemble(&pages)
        .context("Failed to assemble translated pages")?;

    let output_path = args.output.clone().unwrap_or_else(|| default_output_path(input));
    write_output(&output_path, &output_bytes)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("Translated PDF saved to: {}", output_path.display());
    }

    Ok(())
}
