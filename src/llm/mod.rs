//! LLM client: structured-output extraction with retry/backoff.
//!
//! Grounded on `embedding::openai::OpenAiEmbeddingProvider`: a `reqwest`
//! client, bearer auth header, JSON request/response bodies, and an explicit
//! status-code branch into a dedicated error-shape struct rather than
//! blanket `?`-propagation of `reqwest::Error`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{classify_transient, Error, Result};
use crate::retry::{retry_with_backoff, RetryConfig};

/// A single extraction call's usage and outcome.
#[derive(Debug, Clone)]
pub struct LlmExtraction {
    pub parsed: Value,
    pub tokens: u64,
    pub finish_reason: String,
}

/// Model tier selected by the complexity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Flash,
    Pro,
}

impl ModelTier {
    fn model_name(&self) -> &'static str {
        match self {
            ModelTier::Flash => "flash-class",
            ModelTier::Pro => "pro-class",
        }
    }
}

/// Structured-output extraction under a JSON schema.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn extract(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
        tier: ModelTier,
    ) -> Result<LlmExtraction>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// `reqwest`-backed [`LlmClient`] against an OpenAI-compatible chat-completions
/// endpoint. Safe for concurrent use — holds its own connection pool and is
/// shared as a process-wide singleton via `Arc`.
pub struct HttpLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpLlmClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a valid timeout");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn call_once(&self, system: &str, prompt: &str, schema: &Value, tier: ModelTier) -> Result<LlmExtraction> {
        let body = ChatRequest {
            model: tier.model_name(),
            temperature: 1.0,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            response_format: ResponseFormat { kind: "json_schema", json_schema: schema },
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|body| body.error.message)
                .unwrap_or(raw);
            return Err(classify_message(status.as_u16(), &message));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| Error::LlmFatal(format!("malformed response body: {err}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmFatal("no choices in response".to_string()))?;

        let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let finish_reason = choice.finish_reason;
        let content = choice.message.content;

        if content.as_deref().unwrap_or("").is_empty() && finish_reason == "length" {
            return Err(Error::LlmTruncation(format!(
                "response truncated before completion (finish_reason=length, tokens={tokens})"
            )));
        }

        let content = content.ok_or_else(|| Error::LlmFatal("empty response content".to_string()))?;
        let json_value: Value = serde_json::from_str(&content)
            .map_err(|err| Error::LlmFatal(format!("response was not valid JSON: {err}")))?;

        Ok(LlmExtraction { parsed: json_value, tokens, finish_reason })
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> Error {
    let message = err.to_string();
    if err.is_timeout() || classify_transient(&message) {
        Error::LlmTransient(message)
    } else {
        Error::LlmFatal(message)
    }
}

fn classify_message(status: u16, message: &str) -> Error {
    let combined = format!("HTTP {status}: {message}");
    if classify_transient(&combined) {
        Error::LlmTransient(combined)
    } else {
        Error::LlmFatal(combined)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn extract(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
        tier: ModelTier,
    ) -> Result<LlmExtraction> {
        retry_with_backoff(
            RetryConfig::STANDARD,
            |err: &Error| err.is_transient(),
            || self.call_once(system, prompt, schema, tier),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_tier_names_match_classifier_promotion() {
        assert_eq!(ModelTier::Flash.model_name(), "flash-class");
        assert_eq!(ModelTier::Pro.model_name(), "pro-class");
    }

    #[test]
    fn classify_message_flags_rate_limit_as_transient() {
        let err = classify_message(429, "rate limit exceeded");
        assert!(matches!(err, Error::LlmTransient(_)));
    }

    #[test]
    fn classify_message_flags_auth_failure_as_fatal() {
        let err = classify_message(401, "invalid api key");
        assert!(matches!(err, Error::LlmFatal(_)));
    }
}
