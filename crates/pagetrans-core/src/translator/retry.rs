use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::traits::{Translator, TranslatorInfo};
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, FailureKind, Result};
use crate::util::preview;

/// Default number of attempts per text
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default delay between attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Retry policy applied by [`RetryingTranslator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub const fn from_config(config: &TranslatorConfig) -> Self {
        Self::new(config.retry_count, Duration::from_millis(config.retry_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_COUNT, Duration::from_millis(DEFAULT_RETRY_DELAY_MS))
    }
}

/// Decorator adding bounded retries and original-text fallback to any
/// [`Translator`].
///
/// `translate` never returns `Err`: blank input comes back untouched without
/// a backend call, and a text that still fails after the last attempt (or on
/// a fatal error) comes back untranslated. A partly translated document is
/// preferred over an aborted run.
pub struct RetryingTranslator {
    inner: Arc<dyn Translator>,
    policy: RetryPolicy,
}

impl RetryingTranslator {
    pub fn new(inner: Arc<dyn Translator>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Translate, falling back to `text` itself when the backend gives up.
    pub async fn translate_or_original(&self, text: &str, source: &Lang, target: &Lang) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            debug!(
                "Translation attempt {}/{} with {} for '{}'",
                attempt,
                attempts,
                self.inner.name(),
                preview(text, 40)
            );

            let err = match self.inner.translate(text, source, target).await {
                Ok(translated) => {
                    debug!("Translation attempt {}/{} succeeded", attempt, attempts);
                    return translated;
                }
                Err(err) => err,
            };

            match err.failure_kind() {
                Some(FailureKind::Fatal) | None => {
                    error!(
                        "Translation failed permanently on attempt {}/{}: {}; using original text",
                        attempt, attempts, err
                    );
                    return text.to_string();
                }
                Some(FailureKind::Retryable) => {
                    if matches!(err, Error::TranslationInvalidResponse(_)) {
                        warn!("Translation API response decode error, attempt {}/{}: {}", attempt, attempts, err);
                    } else {
                        warn!("Translation error on attempt {}/{}: {}", attempt, attempts, err);
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.delay_after(&err)).await;
            }
        }

        error!(
            "Translation failed after {} attempts, using original text",
            attempts
        );
        text.to_string()
    }

    /// Wait at least the configured delay, longer if the server asked for it.
    fn delay_after(&self, err: &Error) -> Duration {
        match err {
            Error::TranslationRateLimited { retry_after: Some(secs) } => {
                self.policy.delay.max(Duration::from_secs(*secs))
            }
            _ => self.policy.delay,
        }
    }
}

#[async_trait]
impl Translator for RetryingTranslator {
    fn info(&self) -> TranslatorInfo {
        self.inner.info()
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        Ok(self.translate_or_original(text, source, target).await)
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

impl std::fmt::Debug for RetryingTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingTranslator")
            .field("inner", &self.inner.name())
            .field("policy", &self.policy)
            .finish()
    }
}
