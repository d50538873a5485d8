// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! End-to-end proposal check.
//!
//! extract text → extract + merge metadata → validate → embed → scan corpus →
//! rank → recommend. Extraction, validation and embedding failures stop the
//! check; generation failures never do.

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use serde::Serialize;

use crate::api::config::EngineConfig;
use crate::api::corpus::{CorpusProject, CorpusStore};
use crate::api::document_parser::DocumentTextExtractor;
use crate::api::embedding::{EmbeddingCache, EmbeddingGenerator};
use crate::api::error::EngineError;
use crate::api::metadata::{extract_metadata, validate_metadata, ExtractedMetadata};
use crate::api::openai::{OpenAiEmbedder, OpenAiTextGenerator};
use crate::api::provider::{Embedder, TextGenerator, TimeoutEmbedder, TimeoutGenerator};
use crate::api::recommendation::{RecommendationGenerator, SimilarProjectContext};
use crate::api::similarity::{select_top, SimilarityCandidate, SimilarityEngine};

/// What the caller gets back from a successful check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityCheckResult {
    pub proposal_metadata: ExtractedMetadata,
    /// Top matches at or above the display threshold, best first.
    pub similar_projects: Vec<SimilarityCandidate>,
    pub recommendations: Vec<String>,
    /// Matches at or above the store threshold, for the caller to persist.
    pub recordable: Vec<SimilarityCandidate>,
}

pub struct ProposalChecker {
    config: EngineConfig,
    extractor: DocumentTextExtractor,
    metadata_generator: TimeoutGenerator,
    recommendation_generator: TimeoutGenerator,
    embedder: TimeoutEmbedder,
    corpus: Arc<dyn CorpusStore>,
    cache: Option<EmbeddingCache>,
}

impl ProposalChecker {
    /// Build a checker over arbitrary service implementations.
    ///
    /// Every external call is wrapped with the deadline configured for its stage.
    pub fn new(
        config: EngineConfig,
        generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        corpus: Arc<dyn CorpusStore>,
    ) -> Self {
        let metadata_generator = TimeoutGenerator::new(Arc::clone(&generator), config.services.metadata_timeout());
        let recommendation_generator = TimeoutGenerator::new(generator, config.services.recommendation_timeout());
        let embedder = TimeoutEmbedder::new(embedder, config.services.embedding_timeout());
        Self {
            extractor: DocumentTextExtractor::new(config.extraction.clone()),
            metadata_generator,
            recommendation_generator,
            embedder,
            corpus,
            cache: None,
            config,
        }
    }

    /// Build a checker backed by the OpenAI-compatible HTTP services in `config.services`.
    pub fn from_config(config: EngineConfig, corpus: Arc<dyn CorpusStore>) -> anyhow::Result<Self> {
        config.validate()?;
        let generator = OpenAiTextGenerator::from_config(&config.services).context("text generation client")?;
        let embedder = OpenAiEmbedder::from_config(&config.services).context("embedding client")?;
        Ok(Self::new(config, Arc::new(generator), Arc::new(embedder), corpus))
    }

    pub fn with_extractor(mut self, extractor: DocumentTextExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Reuse embeddings for identical metadata across checks, keeping the
    /// most recent `DEFAULT_CACHE_CAPACITY` entries.
    pub fn with_embedding_cache(mut self) -> Self {
        self.cache = Some(EmbeddingCache::new());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Text extraction plus merged metadata, without validation.
    pub fn extract_document_metadata(&self, file_bytes: &[u8], mime_hint: &str) -> Result<ExtractedMetadata, EngineError> {
        if file_bytes.is_empty() {
            return Err(EngineError::InvalidInput("empty upload".to_string()));
        }
        let text = self
            .extractor
            .extract_limited_text(file_bytes, mime_hint, self.config.extraction.max_pages)?;
        let generator: &dyn TextGenerator = &self.metadata_generator;
        Ok(extract_metadata(&text, Some(generator), &self.config.extraction))
    }

    /// Run the full check on an uploaded document.
    pub fn check_proposal(&self, file_bytes: &[u8], mime_hint: &str) -> Result<SimilarityCheckResult, EngineError> {
        info!("[pipeline] Checking proposal ({} bytes, {})", file_bytes.len(), mime_hint);
        let metadata = self.extract_document_metadata(file_bytes, mime_hint)?;
        self.check_metadata(metadata)
    }

    /// Run the check on metadata the caller already has.
    pub fn check_metadata(&self, metadata: ExtractedMetadata) -> Result<SimilarityCheckResult, EngineError> {
        validate_metadata(&metadata)?;

        let generator = match &self.cache {
            Some(cache) => EmbeddingGenerator::with_cache(&self.embedder, cache),
            None => EmbeddingGenerator::new(&self.embedder),
        };
        let query_vec = generator.generate_embeddings(&metadata)?;

        let corpus = self
            .corpus
            .projects()
            .map_err(|e| EngineError::Io(format!("corpus unavailable: {:#}", e)))?;

        let engine = SimilarityEngine::new(&self.config.similarity);
        let matches = engine.find_display_matches(&query_vec, &metadata, &corpus);
        let similar_projects = select_top(&matches, self.config.similarity.display_top_k);
        let recordable = engine.recordable(&matches);
        if matches.is_empty() {
            info!("[pipeline] No similar projects found in {} corpus entries", corpus.len());
        }

        let context: Vec<SimilarProjectContext> = select_top(&matches, self.config.similarity.recommendation_top_k)
            .iter()
            .map(|m| SimilarProjectContext::from_match(m, find_project(&corpus, &m.target_id)))
            .collect();
        let recommendations =
            RecommendationGenerator::new(&self.recommendation_generator).generate(&metadata, &context);
        if recommendations.is_empty() {
            warn!("[pipeline] Recommendation stage returned nothing");
        }

        info!(
            "[pipeline] Check complete: {} shown, {} recordable, {} recommendations",
            similar_projects.len(),
            recordable.len(),
            recommendations.len()
        );
        Ok(SimilarityCheckResult { proposal_metadata: metadata, similar_projects, recommendations, recordable })
    }
}

fn find_project<'a>(corpus: &'a [CorpusProject], id: &str) -> Option<&'a CorpusProject> {
    corpus.iter().find(|p| p.id == id)
}
