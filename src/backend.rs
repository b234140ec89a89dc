//! Translation backends.
//!
//! The engine only needs `raw_translate(text) -> text`; every adapter is
//! responsible for classifying its own failures into a [`FailureKind`].

use crate::config::BackendConfig;
use crate::error::{BackendError, FailureKind};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Raw, single-shot translation capability.
pub trait TranslationBackend {
    fn raw_translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, BackendError>>;
}

impl<T: TranslationBackend + ?Sized> TranslationBackend for Box<T> {
    fn raw_translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        (**self).raw_translate(text)
    }
}

impl<T: TranslationBackend + ?Sized> TranslationBackend for Arc<T> {
    fn raw_translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        (**self).raw_translate(text)
    }
}

/// OpenAI Chat Completion request for translation
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Build the system prompt for translating one cell
fn build_translation_system_prompt(target_language: &str) -> String {
    format!(
        r#"You are a professional translator working on spreadsheet data. Translate the text of a single spreadsheet cell into {}.

## Rules
- Return ONLY the translated text, without quotes, notes or explanations
- Keep numbers, codes, units and identifiers unchanged
- Keep proper names of people, companies and products
- Preserve line breaks and punctuation
- If the text is already in {}, return it unchanged"#,
        target_language, target_language
    )
}

/// Translator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn request(&self, text: &str) -> Result<String, BackendError> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_translation_system_prompt(&self.config.target_language),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                BackendError::network(format!("Failed to send translation request: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(BackendError::new(
                classify_status(status.as_u16()),
                format!("Translation API error ({}): {}", status, body),
            ));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            BackendError::other(format!("Failed to parse translation response: {}", e))
        })?;

        let translated = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| BackendError::other("Translation response contained no choices"))?;

        Ok(translated)
    }
}

impl TranslationBackend for OpenAiBackend {
    fn raw_translate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, BackendError>> {
        Box::pin(self.request(text))
    }
}

/// Map an HTTP status to a failure class.
///
/// 429 means throttling, 5xx and 408 are treated as transient outages, every
/// other status is a plain failure.
fn classify_status(status: u16) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        408 | 500..=599 => FailureKind::Network,
        _ => FailureKind::Other,
    }
}
