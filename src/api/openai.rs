// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Blocking clients for OpenAI-compatible chat-completion and embedding endpoints.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::config::ServiceConfig;
use crate::api::provider::{Embedder, GenerationRequest, ResponseFormat, TextGenerator};

fn build_client(api_key: &str, timeout: Duration) -> Result<Client> {
    anyhow::ensure!(!api_key.trim().is_empty(), "missing API key");
    let mut headers = HeaderMap::new();
    let auth = format!("Bearer {}", api_key.trim());
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&auth).context("invalid API key")?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .context("failed to build HTTP client")
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(4) as u32;
    Duration::from_millis(250 * (1 << capped))
}

/// POST `body` to `endpoint`, retrying 429/5xx and transient transport errors.
fn post_with_retry<B: Serialize>(
    client: &Client,
    endpoint: &str,
    body: &B,
    max_retries: usize,
) -> Result<Response> {
    let mut attempt = 0usize;
    loop {
        match client.post(endpoint).json(body).send() {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().unwrap_or_else(|_| "<body unavailable>".to_string());
                if should_retry(status) && attempt < max_retries {
                    attempt += 1;
                    debug!("[openai] {} from {}, retry {}", status, endpoint, attempt);
                    thread::sleep(retry_backoff(attempt));
                    continue;
                }
                bail!("request to {} failed ({}): {}", endpoint, status, text);
            }
            Err(err) => {
                if (err.is_connect() || err.is_request()) && !err.is_timeout() && attempt < max_retries {
                    attempt += 1;
                    thread::sleep(retry_backoff(attempt));
                    continue;
                }
                return Err(err).with_context(|| format!("failed to call {}", endpoint));
            }
        }
    }
}

/// Chat-completions backed [`TextGenerator`].
pub struct OpenAiTextGenerator {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl OpenAiTextGenerator {
    pub fn new(api_key: &str, base_url: &str, model: String, timeout: Duration, max_retries: usize) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing generation model name");
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            max_retries,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let timeout = config.metadata_timeout().max(config.recommendation_timeout());
        Self::new(
            &config.api_key,
            &config.api_base_url,
            config.generation_model.clone(),
            timeout,
            config.max_retries,
        )
    }
}

impl TextGenerator for OpenAiTextGenerator {
    fn generate_text(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.3,
            messages: vec![ChatMessage { role: "user", content: request.prompt }],
            response_format: request
                .response_format
                .map(|ResponseFormat::Json| ChatResponseFormat { kind: "json_object" }),
        };
        let resp = post_with_retry(&self.client, &self.endpoint, &body, self.max_retries)?;
        let parsed: ChatResponse = resp.json().context("failed to parse chat completion response")?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .context("chat completion returned no content")
    }
}

/// Embeddings-endpoint backed [`Embedder`].
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: String, timeout: Duration, max_retries: usize) -> Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        Ok(Self {
            client: build_client(api_key, timeout)?,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            max_retries,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(
            &config.api_key,
            &config.api_base_url,
            config.embedding_model.clone(),
            config.embedding_timeout(),
            config.max_retries,
        )
    }
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest { model: &self.model, input: text };
        let resp = post_with_retry(&self.client, &self.endpoint, &body, self.max_retries)?;
        let parsed: EmbeddingResponse = resp.json().context("failed to parse embedding response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .context("embedding response contained no vectors")
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ChatResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
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
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
