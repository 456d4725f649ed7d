mod openai;
mod retry;
mod traits;

pub use openai::OpenAiTranslator;
pub use retry::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY_MS, RetryPolicy, RetryingTranslator};
pub use traits::{Translator, TranslatorInfo};

use crate::config::TranslatorConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create the configured backend translator.
///
/// Fails before any network traffic when the configuration is unusable,
/// e.g. `chatgpt` without an API key.
pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn Translator>> {
    config.validate()?;
    let translator = OpenAiTranslator::new(config)?;
    Ok(Arc::new(translator))
}
