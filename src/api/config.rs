// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Engine configuration.
//!
//! Every threshold and budget used by the pipeline lives here so callers can
//! tune them per deployment. Defaults can be overridden from JSON (serde) or
//! from `PROPOSAL_ENGINE_*` environment variables.

use std::time::Duration;

use log::warn;
use serde::Deserialize;

/// Document extraction budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum pages read from a document.
    pub max_pages: usize,
    /// Characters treated as one page for word-processing documents.
    pub approx_chars_per_page: usize,
    /// Below this many characters a PDF is considered scanned and sent to OCR.
    pub min_text_chars: usize,
    /// Hard cap on the excerpt sent to the generative metadata extractor.
    pub ai_excerpt_chars: usize,
    /// Word cap for the locally extracted problem statement.
    pub problem_statement_max_words: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            approx_chars_per_page: 3000,
            min_text_chars: 100,
            ai_excerpt_chars: 6000,
            problem_statement_max_words: 150,
        }
    }
}

/// Per-field weights of the metadata similarity.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub problem_statement: f64,
    pub objectives: f64,
    pub department: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 0.35, problem_statement: 0.35, objectives: 0.20, department: 0.10 }
    }
}

/// Corpus scan thresholds and result sizes.
///
/// `display_threshold` filters what is shown to the user, `store_threshold`
/// filters what the caller should record as a similarity. They are kept
/// separate on purpose and must not be collapsed into one value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Minimum percentage for a match to be returned at all.
    pub display_threshold: u8,
    /// Minimum percentage for a match to be reported as recordable.
    pub store_threshold: u8,
    /// Matches returned to the caller.
    pub display_top_k: usize,
    /// Matches passed to the recommendation prompt.
    pub recommendation_top_k: usize,
    /// Corpus entries per worker thread during a scan.
    pub scan_chunk_size: usize,
    pub weights: FieldWeights,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            display_threshold: 10,
            store_threshold: 20,
            display_top_k: 3,
            recommendation_top_k: 3,
            scan_chunk_size: 256,
            weights: FieldWeights::default(),
        }
    }
}

/// External service endpoints and timeouts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub generation_model: String,
    pub embedding_model: String,
    pub metadata_timeout_secs: u64,
    pub recommendation_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            generation_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            metadata_timeout_secs: 30,
            recommendation_timeout_secs: 45,
            embedding_timeout_secs: 20,
            max_retries: 2,
        }
    }
}

impl ServiceConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn recommendation_timeout(&self) -> Duration {
        Duration::from_secs(self.recommendation_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub similarity: SimilarityConfig,
    pub services: ServiceConfig,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Some(raw) = env(key) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("[config] Ignoring unparsable {}={}", key, raw),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config document; missing keys keep their defaults.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `PROPOSAL_ENGINE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = EngineConfig::default();
        let ex = &mut config.extraction;
        env_parse("PROPOSAL_ENGINE_MAX_PAGES", &mut ex.max_pages);
        env_parse("PROPOSAL_ENGINE_MIN_TEXT_CHARS", &mut ex.min_text_chars);
        env_parse("PROPOSAL_ENGINE_AI_EXCERPT_CHARS", &mut ex.ai_excerpt_chars);

        let sim = &mut config.similarity;
        env_parse("PROPOSAL_ENGINE_DISPLAY_THRESHOLD", &mut sim.display_threshold);
        env_parse("PROPOSAL_ENGINE_STORE_THRESHOLD", &mut sim.store_threshold);
        env_parse("PROPOSAL_ENGINE_DISPLAY_TOP_K", &mut sim.display_top_k);
        env_parse("PROPOSAL_ENGINE_RECOMMENDATION_TOP_K", &mut sim.recommendation_top_k);

        let svc = &mut config.services;
        if let Some(url) = env("PROPOSAL_ENGINE_API_BASE_URL") {
            svc.api_base_url = url;
        }
        if let Some(key) = env("PROPOSAL_ENGINE_API_KEY").or_else(|| env("OPENAI_API_KEY")) {
            svc.api_key = key;
        }
        if let Some(model) = env("PROPOSAL_ENGINE_GENERATION_MODEL") {
            svc.generation_model = model;
        }
        if let Some(model) = env("PROPOSAL_ENGINE_EMBEDDING_MODEL") {
            svc.embedding_model = model;
        }
        env_parse("PROPOSAL_ENGINE_METADATA_TIMEOUT_SECS", &mut svc.metadata_timeout_secs);
        env_parse("PROPOSAL_ENGINE_RECOMMENDATION_TIMEOUT_SECS", &mut svc.recommendation_timeout_secs);
        env_parse("PROPOSAL_ENGINE_EMBEDDING_TIMEOUT_SECS", &mut svc.embedding_timeout_secs);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let sim = &self.similarity;
        anyhow::ensure!(sim.display_threshold <= 100, "display_threshold must be 0-100");
        anyhow::ensure!(sim.store_threshold <= 100, "store_threshold must be 0-100");
        anyhow::ensure!(sim.display_top_k > 0, "display_top_k must be positive");
        anyhow::ensure!(sim.recommendation_top_k > 0, "recommendation_top_k must be positive");
        anyhow::ensure!(sim.scan_chunk_size > 0, "scan_chunk_size must be positive");
        anyhow::ensure!(self.extraction.max_pages > 0, "max_pages must be positive");
        let w = &sim.weights;
        anyhow::ensure!(
            [w.title, w.problem_statement, w.objectives, w.department]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0),
            "field weights must be non-negative"
        );
        Ok(())
    }
}
