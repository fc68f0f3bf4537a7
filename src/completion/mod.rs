//! Chat completion clients used to summarize theme clusters.
//!
//! Both adapters issue HTTP requests directly to the provider, with a system role and a single
//! user prompt, and return the trimmed assistant message.

use crate::config::{CompletionProvider, Config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider was misconfigured or unreachable.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a system role and a user prompt, returning the assistant's reply.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError>;
}

/// Build a completion client based on configuration.
pub fn build_completion_client(
    config: &Config,
) -> Result<Arc<dyn CompletionClient>, CompletionError> {
    let client: Arc<dyn CompletionClient> = match config.completion_provider {
        CompletionProvider::Ollama => Arc::new(OllamaCompletionClient::new(
            config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            config.completion_model.clone(),
        )?),
        CompletionProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                CompletionError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiCompletionClient::new(
                config
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_key,
                config.completion_model.clone(),
            )?)
        }
    };
    Ok(client)
}

fn build_http_client() -> Result<Client, CompletionError> {
    Client::builder()
        .user_agent("docsift/completion")
        .build()
        .map_err(|error| CompletionError::ProviderUnavailable(error.to_string()))
}

fn chat_messages(system: &str, prompt: &str) -> serde_json::Value {
    json!([
        { "role": "system", "content": system },
        { "role": "user", "content": prompt }
    ])
}

/// Completion client for the Ollama `/api/chat` endpoint.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaCompletionClient {
    /// Construct a client for the given Ollama base URL and model.
    pub fn new(base_url: String, model: String) -> Result<Self, CompletionError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        let payload = json!({
            "model": self.model,
            "messages": chat_messages(system, prompt),
            "stream": false,
            "options": {
                // Lower temperature for stable summaries.
                "temperature": 0.1,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CompletionError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(CompletionError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.unwrap_or_default().trim().to_string())
    }
}

/// Completion client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// Construct a client for the given base URL (including the `/v1` prefix), key, and model.
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self, CompletionError> {
        Ok(Self {
            http: build_http_client()?,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": chat_messages(system, prompt),
            }))
            .send()
            .await
            .map_err(|error| {
                CompletionError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let body: OpenAiChatResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode OpenAI response: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("response has no choices".into()))?;
        Ok(content.trim().to_string())
    }
}
