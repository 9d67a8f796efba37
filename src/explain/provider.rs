use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// Trait implemented by concrete chat completion providers.
pub trait LlmProvider: Send + Sync {
    /// Sends one prompt and returns the assistant's reply text.
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, UpstreamError>;
}

/// Request envelope shared by the various providers.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// Chat model to run.
    pub model: &'a str,
    /// User prompt.
    pub prompt: &'a str,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

const SYSTEM_PROMPT: &str =
    "You explain job search results. Answer with JSON only and never invent job ids.";

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct ChatProvider {
    endpoint: String,
    headers: HeaderMap,
    client: Client,
}

impl ChatProvider {
    /// Builds a provider talking to `{base_url}/chat/completions`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        if api_key.trim().is_empty() {
            return Err(UpstreamError::Credential("missing chat API key".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| UpstreamError::Credential("API key is not a valid header".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            headers,
            client,
        })
    }
}

impl LlmProvider for ChatProvider {
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String, UpstreamError> {
        let body = ChatRequest {
            model: request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: ChatResponse = resp
            .json()
            .map_err(|err| UpstreamError::Decode(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(UpstreamError::Empty)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
