// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Embedding generation for proposal metadata.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::api::error::EngineError;
use crate::api::metadata::ExtractedMetadata;
use crate::api::provider::Embedder;

/// Assemble the text sent to the embedding service.
///
/// Sections whose source field is empty are omitted entirely.
pub fn build_embedding_text(metadata: &ExtractedMetadata) -> String {
    let mut sections: Vec<String> = Vec::new();
    if let Some(title) = metadata.title_text() {
        sections.push(format!("Title: {}", title));
    }
    if let Some(ps) = metadata.problem_statement_text() {
        sections.push(format!("Problem Statement: {}", ps));
    }
    let objectives: Vec<String> = metadata.objective_items().map(|o| format!("- {}", o)).collect();
    if !objectives.is_empty() {
        sections.push(format!("Objectives:\n{}", objectives.join("\n")));
    }
    sections.join("\n")
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Entries kept by [`EmbeddingCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

#[derive(Default)]
struct CacheEntries {
    vectors: HashMap<String, Vec<f32>>,
    // insertion order, oldest first
    order: VecDeque<String>,
}

/// Bounded in-memory embedding cache keyed by the SHA-256 of the embedded text.
///
/// Once full, each insert evicts the oldest entry.
pub struct EmbeddingCache {
    entries: RwLock<CacheEntries>,
    capacity: usize,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of 0 disables caching.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: RwLock::new(CacheEntries::default()), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.read().ok()?.vectors.get(key).cloned()
    }

    fn insert(&self, key: String, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        if entries.vectors.insert(key.clone(), vector).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.vectors.remove(&oldest);
                debug!("[embedding] Cache full ({}), evicted oldest entry", self.capacity);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.vectors.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.vectors.clear();
            entries.order.clear();
        }
    }
}

/// Turns validated metadata into an embedding vector.
pub struct EmbeddingGenerator<'a> {
    embedder: &'a dyn Embedder,
    cache: Option<&'a EmbeddingCache>,
}

impl<'a> EmbeddingGenerator<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder, cache: None }
    }

    pub fn with_cache(embedder: &'a dyn Embedder, cache: &'a EmbeddingCache) -> Self {
        Self { embedder, cache: Some(cache) }
    }

    /// Embed `metadata`.
    ///
    /// An empty vector means "nothing to compare" (no usable fields), never a
    /// zero vector. Service failures surface as `EmbeddingService`.
    pub fn generate_embeddings(&self, metadata: &ExtractedMetadata) -> Result<Vec<f32>, EngineError> {
        let text = build_embedding_text(metadata);
        if text.trim().is_empty() {
            debug!("[embedding] No usable metadata, skipping embedding");
            return Ok(Vec::new());
        }

        let key = content_hash(&text);
        if let Some(cached) = self.cache.and_then(|c| c.get(&key)) {
            debug!("[embedding] Cache hit ({} dims)", cached.len());
            return Ok(cached);
        }

        let vector = self
            .embedder
            .embed(&text)
            .map_err(|e| EngineError::EmbeddingService(format!("{:#}", e)))?;

        if vector.is_empty() {
            return Err(EngineError::EmbeddingService("service returned an empty vector".to_string()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::EmbeddingService("service returned non-finite values".to_string()));
        }
        if vector.iter().all(|v| *v == 0.0) {
            warn!("[embedding] Service returned an all-zero vector ({} dims); likely a degenerate response", vector.len());
        }

        info!("[embedding] Generated {}-dim embedding for {} chars", vector.len(), text.chars().count());
        if let Some(cache) = self.cache {
            cache.insert(key, vector.clone());
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    impl Embedder for FixedEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }
    }

    struct DownEmbedder;

    impl Embedder for DownEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
    }

    fn sample() -> ExtractedMetadata {
        ExtractedMetadata {
            title: Some("Blockchain Voting".to_string()),
            problem_statement: Some("Paper ballots are slow.".to_string()),
            objectives: vec!["To design a ledger".to_string(), " ".to_string(), "To implement a client".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_embedding_text_format() {
        assert_eq!(
            build_embedding_text(&sample()),
            "Title: Blockchain Voting\nProblem Statement: Paper ballots are slow.\nObjectives:\n- To design a ledger\n- To implement a client"
        );
    }

    #[test]
    fn test_build_embedding_text_omits_empty_sections() {
        let meta = ExtractedMetadata {
            title: Some("  ".to_string()),
            problem_statement: Some("Only this".to_string()),
            ..Default::default()
        };
        assert_eq!(build_embedding_text(&meta), "Problem Statement: Only this");
    }

    #[test]
    fn test_empty_metadata_returns_empty_vector_without_calling_service() {
        let embedder = FixedEmbedder { vector: vec![1.0], calls: AtomicUsize::new(0) };
        let vector = EmbeddingGenerator::new(&embedder).generate_embeddings(&ExtractedMetadata::default()).unwrap();
        assert!(vector.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_service_failure_is_embedding_error() {
        let err = EmbeddingGenerator::new(&DownEmbedder).generate_embeddings(&sample()).unwrap_err();
        assert!(matches!(err, EngineError::EmbeddingService(ref m) if m.contains("connection refused")));
    }

    #[test]
    fn test_empty_payload_is_error() {
        let embedder = FixedEmbedder { vector: vec![], calls: AtomicUsize::new(0) };
        assert!(EmbeddingGenerator::new(&embedder).generate_embeddings(&sample()).is_err());
    }

    #[test]
    fn test_all_zero_vector_is_accepted() {
        let embedder = FixedEmbedder { vector: vec![0.0; 4], calls: AtomicUsize::new(0) };
        let vector = EmbeddingGenerator::new(&embedder).generate_embeddings(&sample()).unwrap();
        assert_eq!(vector, vec![0.0; 4]);
    }

    #[test]
    fn test_cache_avoids_second_call() {
        let embedder = FixedEmbedder { vector: vec![0.5, 0.5], calls: AtomicUsize::new(0) };
        let cache = EmbeddingCache::new();
        let generator = EmbeddingGenerator::with_cache(&embedder, &cache);
        let first = generator.generate_embeddings(&sample()).unwrap();
        let second = generator.generate_embeddings(&sample()).unwrap();
        assert_eq!(first, second);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_oldest_when_full() {
        let embedder = FixedEmbedder { vector: vec![0.5, 0.5], calls: AtomicUsize::new(0) };
        let cache = EmbeddingCache::with_capacity(2);
        let generator = EmbeddingGenerator::with_cache(&embedder, &cache);
        let titled = |t: &str| ExtractedMetadata { title: Some(t.to_string()), ..Default::default() };

        for title in ["Campus Shuttle", "Library Kiosk", "Exam Timetabler"] {
            generator.generate_embeddings(&titled(title)).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

        // newest two still hit, the first was evicted
        generator.generate_embeddings(&titled("Exam Timetabler")).unwrap();
        generator.generate_embeddings(&titled("Library Kiosk")).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        generator.generate_embeddings(&titled("Campus Shuttle")).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_cache_stores_nothing() {
        let embedder = FixedEmbedder { vector: vec![1.0], calls: AtomicUsize::new(0) };
        let cache = EmbeddingCache::with_capacity(0);
        let generator = EmbeddingGenerator::with_cache(&embedder, &cache);
        generator.generate_embeddings(&sample()).unwrap();
        generator.generate_embeddings(&sample()).unwrap();
        assert!(cache.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(EmbeddingCache::new().capacity(), DEFAULT_CACHE_CAPACITY);
    }
}
