use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::traits::{Translator, TranslatorInfo};
use crate::config::{Lang, TranslatorConfig, TranslatorKind};
use crate::error::{Error, Result};
use crate::util::preview;

/// OpenAI chat-completions translator.
///
/// Works with llama.cpp server, Ollama, vLLM, DeepSeek and the hosted
/// OpenAI API. Each call is a single request; wrap it in
/// [`super::RetryingTranslator`] for retries.
pub struct OpenAiTranslator {
    client: Client,
    kind: TranslatorKind,
    /// Base URL for the API (e.g., "http://localhost:11434/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ConfigInvalid {
                field: "translator".to_string(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        let api_key = config.api_key().map(str::to_string);
        info!(
            "Using {} model '{}' at {}",
            if api_key.is_some() { "remote" } else { "local" },
            config.model,
            config.api_base
        );

        Ok(Self {
            client,
            kind: config.kind,
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Create translation prompt
    fn create_prompt(text: &str, source: &Lang, target: &Lang) -> String {
        let source_hint = if source.is_auto() {
            String::new()
        } else {
            format!(" from {}", language_name(source))
        };
        format!(
            "Translate the following text{} into {}. Output only the translation, no explanations, no introductory text.\n\nText: \"{}\"",
            source_hint,
            language_name(target),
            text
        )
    }

    async fn request(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        let request = ChatRequest {
            model: if self.model.is_empty() { "default_model" } else { &self.model },
            messages: vec![Message {
                role: "user",
                content: Self::create_prompt(text, source, target),
            }],
            temperature: Some(0.3),
        };

        let mut req = self.client.post(self.endpoint()).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::TranslationTimeout
            } else {
                Error::TranslationRequest(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::TranslationTimeout
            } else {
                Error::TranslationRequest(format!("failed to read response body: {e}"))
            }
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body, retry_after));
        }

        parse_reply(&body)
    }
}

/// Map a non-success HTTP status to a classified error.
fn status_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> Error {
    match status {
        StatusCode::TOO_MANY_REQUESTS => Error::TranslationRateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT => Error::TranslationTimeout,
        s if s.is_client_error() => Error::TranslationRejected {
            status: s.as_u16(),
            body: preview(body, 200),
        },
        s => Error::TranslationRequest(format!("HTTP {}: {}", s, preview(body, 200))),
    }
}

/// Pull the translation out of a chat completions body.
fn parse_reply(body: &str) -> Result<String> {
    let reply: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::TranslationInvalidResponse(format!("JSON decode error: {e}")))?;

    let content = reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::TranslationInvalidResponse("No choices in response".to_string()))?;

    // Models often echo the quotes from the prompt
    let translated = content.trim().trim_start_matches('"').trim_end_matches('"');
    Ok(translated.to_string())
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: self.kind.label(),
            requires_api_key: self.kind.requires_api_key(),
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        if !self.is_available() {
            return Err(Error::TranslationMissingApiKey {
                translator: self.kind.label(),
            });
        }

        debug!(
            "Requesting {} -> {} translation of '{}' from {}",
            source,
            target,
            preview(text, 40),
            self.endpoint()
        );
        self.request(text, source, target).await
    }

    fn is_available(&self) -> bool {
        !self.kind.requires_api_key() || self.api_key.is_some()
    }
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &str {
    match lang.as_str() {
        "en" => "English",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "nl" => "Dutch",
        "pl" => "Polish",
        // The model understands most ISO codes directly
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name() {
        assert_eq!(language_name(&Lang::new("en")), "English");
        assert_eq!(language_name(&Lang::new("zh-CN")), "Simplified Chinese");
        assert_eq!(language_name(&Lang::new("sv")), "sv");
    }

    #[test]
    fn test_prompt_mentions_languages_and_text() {
        let prompt = OpenAiTranslator::create_prompt("Hallo Welt", &Lang::new("de"), &Lang::new("en"));
        assert!(prompt.contains("from German into English"));
        assert!(prompt.ends_with("Text: \"Hallo Welt\""));

        let prompt = OpenAiTranslator::create_prompt("Hallo", &Lang::new("auto"), &Lang::new("fr"));
        assert!(prompt.starts_with("Translate the following text into French."));
    }

    #[test]
    fn test_parse_reply_strips_quotes() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  \"Hello world\"\n"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_parse_reply_malformed_is_retryable() {
        let err = parse_reply("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, Error::TranslationInvalidResponse(_)));
        assert!(err.is_retryable());

        let err = parse_reply(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", Some(3)),
            Error::TranslationRateLimited { retry_after: Some(3) }
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "upstream", None).is_retryable());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "bad key", None).is_retryable());
    }

    #[test]
    fn test_local_translator_needs_no_key() {
        let translator = OpenAiTranslator::new(&TranslatorConfig::default()).unwrap();
        assert!(translator.is_available());
        assert_eq!(translator.name(), "openai");
        assert_eq!(translator.endpoint(), "http://localhost:11434/v1/chat/completions");
    }
}
