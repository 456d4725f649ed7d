use async_trait::async_trait;

use crate::config::Lang;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Label used in cache keys and logs
    pub name: &'static str,
    /// Whether this translator requires an API key
    pub requires_api_key: bool,
}

/// Translation capability.
///
/// Implementations make a single attempt and report failures through
/// [`crate::Error::failure_kind`]; retry policy lives in
/// [`super::RetryingTranslator`], which implements this same trait.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Get the translator name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Translate text from source language to target language
    async fn translate(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
    ) -> Result<String>;

    /// Check if the translator is usable with its current configuration
    fn is_available(&self) -> bool {
        true
    }
}
