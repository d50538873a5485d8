// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Capability traits for the external AI services.
//!
//! Extraction, embedding and recommendation code only ever see these traits,
//! so the concrete model or vendor can be swapped without touching them.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::warn;
use thiserror::Error;

/// Output format requested from the text generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
}

/// Request envelope shared by the text generators.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub prompt: &'a str,
    pub response_format: Option<ResponseFormat>,
}

impl<'a> GenerationRequest<'a> {
    pub fn text(prompt: &'a str) -> Self {
        Self { prompt, response_format: None }
    }

    pub fn json(prompt: &'a str) -> Self {
        Self { prompt, response_format: Some(ResponseFormat::Json) }
    }
}

/// Trait implemented by text-generation backends.
pub trait TextGenerator: Send + Sync {
    fn generate_text(&self, request: &GenerationRequest) -> Result<String>;
}

/// Trait implemented by embedding backends.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Returned (inside `anyhow::Error`) when a service call exceeds its budget.
#[derive(Debug, Error)]
#[error("{service} call timed out after {timeout:?}")]
pub struct ServiceTimeout {
    pub service: &'static str,
    pub timeout: Duration,
}

/// Run `call` on a worker thread and wait at most `timeout` for it.
///
/// The worker is detached on timeout; its result is dropped when it finishes.
pub fn call_with_timeout<T, F>(service: &'static str, timeout: Duration, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("{}-call", service))
        .spawn(move || {
            let _ = tx.send(call());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!("[provider] {} call exceeded {:?}", service, timeout);
            Err(ServiceTimeout { service, timeout }.into())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(anyhow::anyhow!("{} worker exited without a result", service))
        }
    }
}

/// Text generator wrapper that enforces a per-call deadline.
pub struct TimeoutGenerator {
    inner: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl TextGenerator for TimeoutGenerator {
    fn generate_text(&self, request: &GenerationRequest) -> Result<String> {
        let inner = Arc::clone(&self.inner);
        let prompt = request.prompt.to_string();
        let format = request.response_format;
        call_with_timeout("text-generation", self.timeout, move || {
            inner.generate_text(&GenerationRequest { prompt: &prompt, response_format: format })
        })
    }
}

/// Embedder wrapper that enforces a per-call deadline.
pub struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    timeout: Duration,
}

impl TimeoutEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Embedder for TimeoutEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        call_with_timeout("embedding", self.timeout, move || inner.embed(&text))
    }
}
