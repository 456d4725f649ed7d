use thiserror::Error;

/// Unified error type for pagetrans-core
///
/// Variants are grouped by the stage that produced them so a message always
/// identifies where a run failed:
/// - PDF operations (opening, extraction, rendering, compositing, assembly)
/// - Translation operations (API requests, responses, rate limiting)
/// - Cache operations (reading, writing)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to composite translations onto a page
    #[error("failed to composite page {page}: {reason}")]
    PdfComposite { page: usize, reason: String },

    /// Failed to concatenate translated pages
    #[error("failed to assemble output document: {0}")]
    PdfAssemble(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Failed to load or parse the overlay font
    #[error("failed to load overlay font: {0}")]
    FontLoad(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed (transport level)
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Translation API rejected the request (HTTP 4xx other than 429)
    #[error("translation API rejected request: HTTP {status}: {body}")]
    TranslationRejected { status: u16, body: String },

    /// Invalid or undecodable response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// API key not configured for a translator that requires one
    #[error("translation API key not configured for {translator}")]
    TranslationMissingApiKey { translator: &'static str },

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to read from cache
    #[error("failed to read from cache: {0}")]
    CacheRead(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a translation failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient: transport errors, timeouts, rate limits, malformed responses
    Retryable,
    /// Retrying cannot help: bad credentials, rejected requests
    Fatal,
}

impl Error {
    /// Classify a translation failure. Returns `None` for errors that do not
    /// come from a translation backend.
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::TranslationRequest(_)
            | Self::TranslationInvalidResponse(_)
            | Self::TranslationRateLimited { .. }
            | Self::TranslationTimeout => Some(FailureKind::Retryable),
            Self::TranslationRejected { .. }
            | Self::TranslationMissingApiKey { .. } => Some(FailureKind::Fatal),
            _ => None,
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self.failure_kind(), Some(FailureKind::Retryable))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
