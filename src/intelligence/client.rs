//! Content intelligence over an OpenAI-compatible chat completions API.
//!
//! Works with any server exposing `POST /v1/chat/completions` (Ollama,
//! llama.cpp server, vLLM, hosted gateways). Two models are used: a general
//! instruction model for retention and expiration, and a guard model for
//! the safety check.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::ContentIntelligence;
use super::prompt::{
    self, EXPIRATION_SYSTEM_PROMPT, RETENTION_SYSTEM_PROMPT, expiration_prompt, retention_prompt,
};
use crate::types::{CacheRecord, RetentionAction};
use crate::{MuninnError, Result};

/// Default base URL (a local Ollama instance).
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a chat-completions endpoint.
#[derive(Clone)]
pub struct ChatIntelligence {
    http: Client,
    base_url: String,
    model: String,
    guard_model: String,
    api_key: Option<String>,
}

impl ChatIntelligence {
    /// Create a client for `base_url` using `model` for analysis and
    /// `guard_model` for safety checks.
    ///
    /// `request_timeout` bounds each HTTP round trip.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        guard_model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| MuninnError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            guard_model: guard_model.into(),
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Run one chat completion and return the trimmed reply text.
    async fn complete(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let mut request = self.http.post(&url).json(&ChatRequest {
            model,
            messages,
            max_tokens,
            temperature: 0.0,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        handle_response_errors(&response)?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::Http(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(MuninnError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Check response status and map to appropriate error.
fn handle_response_errors(response: &reqwest::Response) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(MuninnError::RateLimited { retry_after })
        }
        code => Err(MuninnError::Api {
            status: code,
            message: format!("chat completions error: {status}"),
        }),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ContentIntelligence for ChatIntelligence {
    fn name(&self) -> &str {
        "chat"
    }

    async fn check_safety(&self, text: &str) -> Result<bool> {
        let reply = self.complete(&self.guard_model, None, text, 20).await?;
        Ok(prompt::parse_safety(&reply))
    }

    async fn classify_retention(&self, record: &CacheRecord) -> Result<RetentionAction> {
        let reply = self
            .complete(
                &self.model,
                Some(RETENTION_SYSTEM_PROMPT),
                &retention_prompt(record),
                150,
            )
            .await?;
        Ok(prompt::parse_retention(&reply))
    }

    async fn predict_expiration(&self, record: &CacheRecord) -> Result<i64> {
        let reply = self
            .complete(
                &self.model,
                Some(EXPIRATION_SYSTEM_PROMPT),
                &expiration_prompt(record),
                50,
            )
            .await?;
        prompt::parse_ttl(&reply)
    }
}
