//! External text-generation collaborators.
//!
//! The narrative layer talks to providers through the [`TextGenerator`]
//! capability trait; failures are typed so callers can distinguish a
//! timeout from an auth or quota problem, and every failure is
//! recoverable by falling back to the local templates.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LlmFailure {
    #[error("request timed out")]
    Timeout,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("quota exhausted: {0}")]
    Quota(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed provider response: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> std::result::Result<String, LlmFailure>;
}

fn classify_send_error(err: reqwest::Error) -> LlmFailure {
    if err.is_timeout() {
        LlmFailure::Timeout
    } else {
        LlmFailure::Network(err.to_string())
    }
}

async fn classify_status(response: reqwest::Response) -> std::result::Result<reqwest::Response, LlmFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_else(|_| String::new());
    let detail = format!("{}: {}", status, body);
    match status.as_u16() {
        401 | 403 => Err(LlmFailure::Auth(detail)),
        429 => Err(LlmFailure::Quota(detail)),
        _ => Err(LlmFailure::Network(detail)),
    }
}

/// OpenAI-compatible chat-completions client.
#[derive(Clone)]
pub struct OpenAiClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            api_key,
            base_url,
            model,
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> std::result::Result<String, LlmFailure> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
            "max_tokens": 512,
        });

        debug!(model = %self.model, "calling chat-completions endpoint");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;
        let response = classify_status(response).await?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmFailure::Protocol(e.to_string()))?;

        let content = payload["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmFailure::Protocol(format!(
                "no content in response: {}",
                payload
            )));
        }
        Ok(content)
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout: Duration) -> Self {
        Self {
            api_key,
            base_url,
            model,
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> std::result::Result<String, LlmFailure> {
        let mut body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}],
            }],
            "generationConfig": {
                "temperature": 0.2,
                "maxOutputTokens": 512,
            },
        });
        if let Some(system) = system {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        debug!(model = %self.model, "calling generateContent endpoint");
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;
        let response = classify_status(response).await?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmFailure::Protocol(e.to_string()))?;

        let content = payload["candidates"]
            .get(0)
            .and_then(|c| c["content"]["parts"].get(0))
            .and_then(|part| part["text"].as_str())
            .unwrap_or("")
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(LlmFailure::Protocol(format!(
                "no candidate text in response: {}",
                payload
            )));
        }
        Ok(content)
    }
}
