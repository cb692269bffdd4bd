//! Client for OpenAI-compatible completion endpoints.
//!
//! One request per user turn: no retries, no caching, no streaming. Every
//! failure is reported as a [`CompletionError`]; nothing panics past this
//! boundary.

use futures_util::future::BoxFuture;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{CompletionConfig, RequestStyle};
use crate::message::Attachment;

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("completion endpoint is not configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        CompletionError::Transport(e.to_string())
    }
}

/// A single user turn as sent to the endpoint.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl CompletionRequest {
    pub fn new(text: impl Into<String>) -> Self {
        CompletionRequest {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    /// User text followed by a description of any attached files.
    pub fn prompt(&self) -> String {
        let text = self.text.trim();
        if self.attachments.is_empty() {
            return text.to_string();
        }

        let mut prompt = String::new();
        if !text.is_empty() {
            prompt.push_str(text);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Attached files:");
        for file in &self.attachments {
            prompt.push_str("\n- ");
            prompt.push_str(&file.describe());
        }
        prompt
    }
}

/// Anything that can turn a user turn into reply text.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String, CompletionError>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatTurn {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    prompt: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pulls the reply out of `choices[0]`, preferring the chat shape over the prompt shape.
pub fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: CompletionResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;

    let first = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed("no choices in response".to_string()))?;

    let reply = first
        .message
        .and_then(|m| m.content)
        .or(first.text)
        .filter(|reply| !reply.trim().is_empty())
        .ok_or_else(|| CompletionError::Malformed("choice has no text".to_string()))?;

    Ok(reply.trim().to_string())
}

pub struct HttpCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(HttpCompletionClient { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let endpoint = self.config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(CompletionError::NotConfigured);
        }

        let prompt = request.prompt();
        let mut builder = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json");

        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        builder = match self.config.request_style {
            RequestStyle::Chat => builder.json(&ChatRequest {
                model: &self.config.model,
                messages: vec![ChatTurn {
                    role: "user",
                    content: prompt,
                }],
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            }),
            RequestStyle::Prompt => builder.json(&PromptRequest {
                model: &self.config.model,
                prompt,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            }),
        };

        tracing::debug!(
            model = %self.config.model,
            attachments = request.attachments.len(),
            "sending completion request"
        );

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CompletionError::Status {
                code: status.as_u16(),
                body,
            });
        }

        extract_reply(&body)
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(async move {
            let result = self.send(request).await;
            if let Err(e) = &result {
                tracing::warn!("completion failed: {e}");
            }
            result
        })
    }
}
