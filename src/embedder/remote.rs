//! Embedding client for OpenAI-compatible `/embeddings` endpoints (Together by default).

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::QueryEmbedder;
use crate::error::UpstreamError;

/// Default API base for Together's OpenAI-compatible endpoints.
pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";
/// Default embedding model (1024 dimensions).
pub const DEFAULT_MODEL: &str = "BAAI/bge-large-en-v1.5";

/// Blocking embeddings client that sends one query per request.
#[derive(Clone)]
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl RemoteEmbedder {
    /// Builds a new embeddings client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, UpstreamError> {
        if api_key.trim().is_empty() {
            return Err(UpstreamError::Credential("missing embedding API key".into()));
        }
        if model.trim().is_empty() {
            return Err(UpstreamError::Credential("missing embedding model name".into()));
        }
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| UpstreamError::Credential("API key is not a valid header".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model,
            max_retries: max_retries.max(1),
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: [query],
            };
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse = resp
                            .json()
                            .map_err(|err| UpstreamError::Decode(err.to_string()))?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        return parsed
                            .data
                            .into_iter()
                            .next()
                            .map(|entry| entry.embedding)
                            .filter(|embedding| !embedding.is_empty())
                            .ok_or(UpstreamError::Empty);
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::debug!(%status, attempt, "retrying embedding request");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(UpstreamError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        tracing::debug!(attempt, "retrying embedding request after {err}");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

impl QueryEmbedder for RemoteEmbedder {
    fn embed(&self, query: &str) -> Result<Vec<f32>, UpstreamError> {
        self.request(query)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
