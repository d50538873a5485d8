// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Similarity scoring: embedding cosine, weighted metadata overlap and the corpus scan.

use std::collections::{BTreeSet, HashSet};

use log::{debug, info};
use ndarray::Array1;
use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::api::config::{FieldWeights, SimilarityConfig};
use crate::api::corpus::CorpusProject;
use crate::api::metadata::ExtractedMetadata;

/// Section tags attached to a match.
///
/// Apart from `Title` these are heuristic labels derived from the overall
/// percentage, not measured per-section similarities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SimilarSection {
    Title,
    #[serde(rename = "Problem Statement")]
    ProblemStatement,
    Objectives,
    Methodology,
}

impl SimilarSection {
    pub fn label(&self) -> &'static str {
        match self {
            SimilarSection::Title => "Title",
            SimilarSection::ProblemStatement => "Problem Statement",
            SimilarSection::Objectives => "Objectives",
            SimilarSection::Methodology => "Methodology",
        }
    }
}

/// Which signal produced the reported score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimilaritySource {
    /// Embedding cosine was the stronger signal.
    Embedding,
    /// Weighted metadata overlap was the stronger signal (or the only one available).
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityCandidate {
    pub target_id: String,
    pub title: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub similarity_percentage: u8,
    pub similar_sections: BTreeSet<SimilarSection>,
    pub source_context: SimilaritySource,
}

const PROBLEM_STATEMENT_BREAKPOINT: u8 = 70;
const OBJECTIVES_BREAKPOINT: u8 = 50;
const METHODOLOGY_BREAKPOINT: u8 = 30;
const TITLE_OVERLAP_TAG: f64 = 0.5;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "into", "using", "are", "was", "were", "will", "which",
    "their", "there", "these", "those", "its", "has", "have", "been", "being", "can", "not", "but", "all", "any",
    "our", "who", "how", "what", "when", "where", "also", "such", "other", "than", "then", "them", "they",
    "project", "system", "design", "implementation", "develop", "development", "based",
];

/// Cosine similarity clamped to [0, 1].
///
/// Total over its domain: mismatched lengths, empty input, zero magnitude or
/// non-finite values all give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = Array1::from_iter(a.iter().map(|&x| x as f64));
    let b = Array1::from_iter(b.iter().map(|&x| x as f64));

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = a.dot(&b) / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lower-cased content words of at least three characters, stop words removed.
pub fn content_tokens(text: &str) -> HashSet<String> {
    text.unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn text_overlap(a: &str, b: &str) -> f64 {
    jaccard(&content_tokens(a), &content_tokens(b))
}

/// Average over query objectives of the best overlap with any target objective.
fn objectives_overlap(query: &[&str], target: &[&str]) -> f64 {
    if query.is_empty() || target.is_empty() {
        return 0.0;
    }
    let target_tokens: Vec<HashSet<String>> = target.iter().map(|o| content_tokens(o)).collect();
    let total: f64 = query
        .iter()
        .map(|o| {
            let tokens = content_tokens(o);
            target_tokens.iter().map(|t| jaccard(&tokens, t)).fold(0.0, f64::max)
        })
        .sum();
    total / query.len() as f64
}

fn department_match(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        1.0
    } else if a.contains(&b) || b.contains(&a) {
        0.5
    } else {
        0.0
    }
}

/// Weighted field overlap between two metadata records, in [0, 1].
///
/// Divided by the total configured weight, so a field missing on either side
/// counts as no overlap.
pub fn metadata_similarity(a: &ExtractedMetadata, b: &ExtractedMetadata, weights: &FieldWeights) -> f64 {
    let total_weight = weights.title + weights.problem_statement + weights.objectives + weights.department;
    if total_weight <= 0.0 {
        return 0.0;
    }

    let mut score = 0.0;
    if let (Some(x), Some(y)) = (a.title_text(), b.title_text()) {
        score += weights.title * text_overlap(x, y);
    }
    if let (Some(x), Some(y)) = (a.problem_statement_text(), b.problem_statement_text()) {
        score += weights.problem_statement * text_overlap(x, y);
    }
    let objectives_a: Vec<&str> = a.objective_items().collect();
    let objectives_b: Vec<&str> = b.objective_items().collect();
    if !objectives_a.is_empty() && !objectives_b.is_empty() {
        score += weights.objectives * objectives_overlap(&objectives_a, &objectives_b);
    }
    if let (Some(x), Some(y)) = (a.department_text(), b.department_text()) {
        score += weights.department * department_match(x, y);
    }

    (score / total_weight).clamp(0.0, 1.0)
}

/// Convert a [0, 1] similarity to an integer percentage.
pub fn to_percentage(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Percentage breakpoint tags plus a measured title tag.
pub fn classify_sections(percentage: u8, title_overlap: f64) -> BTreeSet<SimilarSection> {
    let mut sections = BTreeSet::new();
    if title_overlap >= TITLE_OVERLAP_TAG {
        sections.insert(SimilarSection::Title);
    }
    if percentage > PROBLEM_STATEMENT_BREAKPOINT {
        sections.insert(SimilarSection::ProblemStatement);
    }
    if percentage > OBJECTIVES_BREAKPOINT {
        sections.insert(SimilarSection::Objectives);
    }
    if percentage > METHODOLOGY_BREAKPOINT {
        sections.insert(SimilarSection::Methodology);
    }
    sections
}

/// Breakpoint tags from a metadata-only score, limited to content both records carry.
fn metadata_sections(
    percentage: u8,
    title_overlap: f64,
    a: &ExtractedMetadata,
    b: &ExtractedMetadata,
) -> BTreeSet<SimilarSection> {
    let shared_problem = a.problem_statement_text().is_some() && b.problem_statement_text().is_some();
    let shared_objectives = a.objective_items().next().is_some() && b.objective_items().next().is_some();

    let mut sections = classify_sections(percentage, title_overlap);
    if !shared_problem {
        sections.remove(&SimilarSection::ProblemStatement);
    }
    if !shared_objectives {
        sections.remove(&SimilarSection::Objectives);
    }
    if !shared_problem && !shared_objectives {
        sections.remove(&SimilarSection::Methodology);
    }
    sections
}

/// Keep the first `k` of an already ranked list.
pub fn select_top(matches: &[SimilarityCandidate], k: usize) -> Vec<SimilarityCandidate> {
    matches.iter().take(k).cloned().collect()
}

/// Corpus comparison with configurable thresholds and weights.
pub struct SimilarityEngine<'a> {
    config: &'a SimilarityConfig,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(config: &'a SimilarityConfig) -> Self {
        Self { config }
    }

    /// Score one corpus entry, or `None` when it cannot be compared.
    fn score(&self, query_vec: &[f32], query_meta: &ExtractedMetadata, project: &CorpusProject) -> Option<SimilarityCandidate> {
        let target_meta = project.as_metadata();
        let weighted = metadata_similarity(query_meta, &target_meta, &self.config.weights);

        let cosine = if query_vec.is_empty() {
            None
        } else {
            if !project.has_embedding() {
                return None;
            }
            Some(cosine_similarity(query_vec, &project.embedding))
        };
        let (similarity, source) = match cosine {
            Some(cosine) if cosine >= weighted => (cosine, SimilaritySource::Embedding),
            _ => (weighted, SimilaritySource::Metadata),
        };

        let percentage = to_percentage(similarity);
        let title_overlap = match (query_meta.title_text(), target_meta.title_text()) {
            (Some(a), Some(b)) => text_overlap(a, b),
            _ => 0.0,
        };
        let similar_sections = match cosine {
            Some(cosine) => classify_sections(to_percentage(cosine), title_overlap),
            None => metadata_sections(percentage, title_overlap, query_meta, &target_meta),
        };
        Some(SimilarityCandidate {
            target_id: project.id.clone(),
            title: project.title.clone(),
            department: project.department.clone(),
            year: project.year.clone(),
            similarity_percentage: percentage,
            similar_sections,
            source_context: source,
        })
    }

    fn score_chunk(
        &self,
        query_vec: &[f32],
        query_meta: &ExtractedMetadata,
        chunk: &[CorpusProject],
        threshold: u8,
    ) -> Vec<SimilarityCandidate> {
        chunk
            .iter()
            .filter_map(|project| self.score(query_vec, query_meta, project))
            .filter(|candidate| candidate.similarity_percentage >= threshold)
            .collect()
    }

    /// Compare the query against every comparable corpus entry.
    ///
    /// An empty `query_vec` switches to metadata-only scoring over the whole
    /// corpus; otherwise entries without an embedding are skipped. Results
    /// below `threshold` percent are dropped and the rest sorted descending,
    /// ties kept in corpus order.
    pub fn scan_corpus(
        &self,
        query_vec: &[f32],
        query_meta: &ExtractedMetadata,
        corpus: &[CorpusProject],
        threshold: u8,
    ) -> Vec<SimilarityCandidate> {
        let chunk_size = self.config.scan_chunk_size.max(1);

        let mut matches: Vec<SimilarityCandidate> = if corpus.len() <= chunk_size {
            self.score_chunk(query_vec, query_meta, corpus, threshold)
        } else {
            std::thread::scope(|s| {
                let handles: Vec<_> = corpus
                    .chunks(chunk_size)
                    .map(|chunk| s.spawn(move || self.score_chunk(query_vec, query_meta, chunk, threshold)))
                    .collect();
                handles
                    .into_iter()
                    .flat_map(|handle| {
                        handle.join().unwrap_or_else(|e| {
                            log::error!("[similarity] Scan worker panicked: {:?}", e);
                            Vec::new()
                        })
                    })
                    .collect()
            })
        };

        // stable: equal percentages stay in corpus order
        matches.sort_by(|a, b| b.similarity_percentage.cmp(&a.similarity_percentage));

        let comparable = if query_vec.is_empty() {
            corpus.len()
        } else {
            corpus.iter().filter(|p| p.has_embedding()).count()
        };
        info!(
            "[similarity] Scanned {} of {} projects, {} at or above {}%",
            comparable,
            corpus.len(),
            matches.len(),
            threshold
        );
        if let Some(best) = matches.first() {
            debug!("[similarity] Best match '{}' at {}%", best.title, best.similarity_percentage);
        }
        matches
    }

    /// Scan with the display threshold.
    pub fn find_display_matches(
        &self,
        query_vec: &[f32],
        query_meta: &ExtractedMetadata,
        corpus: &[CorpusProject],
    ) -> Vec<SimilarityCandidate> {
        self.scan_corpus(query_vec, query_meta, corpus, self.config.display_threshold)
    }

    /// Matches the caller should record, filtered by the store threshold.
    pub fn recordable(&self, matches: &[SimilarityCandidate]) -> Vec<SimilarityCandidate> {
        matches
            .iter()
            .filter(|m| m.similarity_percentage >= self.config.store_threshold)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: &str, title: &str, embedding: Vec<f32>) -> CorpusProject {
        CorpusProject {
            id: id.to_string(),
            title: title.to_string(),
            embedding,
            ..Default::default()
        }
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = [0.3, -1.2, 4.0, 0.0];
        let b = [1.0, 0.5, 2.5, -3.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_cosine_self_is_one() {
        let a = [0.1, 0.7, -0.2, 3.3];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_clamps_negative_to_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_metadata_similarity_identical_records() {
        let meta = ExtractedMetadata {
            title: Some("Smart Irrigation Controller".to_string()),
            problem_statement: Some("Farmers overwater crops during dry seasons".to_string()),
            objectives: vec!["To measure soil moisture".to_string()],
            department: Some("Computer Science".to_string()),
            ..Default::default()
        };
        let score = metadata_similarity(&meta, &meta, &FieldWeights::default());
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_similarity_partial_fields() {
        let a = ExtractedMetadata {
            title: Some("Hospital Queue Management".to_string()),
            department: Some("Computer Science".to_string()),
            ..Default::default()
        };
        let b = ExtractedMetadata {
            title: Some("Bank Queue Management".to_string()),
            department: Some("Information Technology".to_string()),
            ..Default::default()
        };
        // title jaccard 2/4 weighted 0.35; absent fields still count in the divisor
        let score = metadata_similarity(&a, &b, &FieldWeights::default());
        assert!((score - 0.35 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_similarity_nothing_in_common() {
        assert_eq!(
            metadata_similarity(&ExtractedMetadata::default(), &ExtractedMetadata::default(), &FieldWeights::default()),
            0.0
        );
    }

    #[test]
    fn test_classify_sections_breakpoints() {
        let tags = classify_sections(85, 0.0);
        assert!(tags.contains(&SimilarSection::ProblemStatement));
        assert!(tags.contains(&SimilarSection::Objectives));
        assert!(tags.contains(&SimilarSection::Methodology));
        assert!(!tags.contains(&SimilarSection::Title));

        let tags = classify_sections(55, 0.6);
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec![SimilarSection::Title, SimilarSection::Objectives, SimilarSection::Methodology]
        );
        assert!(classify_sections(30, 0.0).is_empty());
    }

    #[test]
    fn test_scan_thresholds_sorts_and_keeps_tie_order() {
        let config = SimilarityConfig::default();
        let engine = SimilarityEngine::new(&config);
        let corpus = vec![
            project("low", "Low", vec![0.0, 1.0]),
            project("tie-a", "Tie A", vec![1.0, 1.0]),
            project("best", "Best", vec![1.0, 0.0]),
            project("none", "No Embedding", vec![]),
            project("tie-b", "Tie B", vec![1.0, 1.0]),
        ];
        let matches = engine.scan_corpus(&[1.0, 0.0], &ExtractedMetadata::default(), &corpus, 10);
        let ids: Vec<&str> = matches.iter().map(|m| m.target_id.as_str()).collect();
        assert_eq!(ids, vec!["best", "tie-a", "tie-b"]);
        assert_eq!(matches[0].similarity_percentage, 100);
        assert_eq!(matches[1].similarity_percentage, 71);
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let config = SimilarityConfig { scan_chunk_size: 2, ..SimilarityConfig::default() };
        let engine = SimilarityEngine::new(&config);
        let corpus: Vec<CorpusProject> = (0..9)
            .map(|i| project(&format!("p{}", i), "P", vec![1.0, i as f32 * 0.25]))
            .collect();
        let parallel = engine.scan_corpus(&[1.0, 0.0], &ExtractedMetadata::default(), &corpus, 0);

        let sequential_config = SimilarityConfig::default();
        let sequential = SimilarityEngine::new(&sequential_config)
            .scan_corpus(&[1.0, 0.0], &ExtractedMetadata::default(), &corpus, 0);
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 9);
        assert_eq!(parallel[0].target_id, "p0");
    }

    #[test]
    fn test_metadata_fallback_when_embedding_degenerate() {
        let config = SimilarityConfig::default();
        let engine = SimilarityEngine::new(&config);
        let query = ExtractedMetadata {
            title: Some("Campus Shuttle Tracking".to_string()),
            ..Default::default()
        };
        let corpus = vec![project("p1", "Campus Shuttle Tracking", vec![0.0, 0.0])];
        let matches = engine.scan_corpus(&[0.0, 0.0], &query, &corpus, 10);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity_percentage, 35);
        assert_eq!(matches[0].source_context, SimilaritySource::Metadata);
        assert_eq!(matches[0].similar_sections.iter().collect::<Vec<_>>(), vec![&SimilarSection::Title]);
    }

    #[test]
    fn test_sparse_corpus_record_does_not_outrank_on_title_alone() {
        let config = SimilarityConfig::default();
        let engine = SimilarityEngine::new(&config);
        let query = ExtractedMetadata {
            title: Some("Blockchain Voting".to_string()),
            problem_statement: Some("Paper ballots are slow to count and easy to tamper with".to_string()),
            objectives: vec!["To record each vote on a shared ledger".to_string()],
            department: Some("Computer Science".to_string()),
            ..Default::default()
        };
        let corpus = vec![project("sparse", "Blockchain Voting", vec![0.0, 1.0])];

        let matches = engine.scan_corpus(&[1.0, 0.0], &query, &corpus, 10);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity_percentage, 35);
        assert_eq!(matches[0].source_context, SimilaritySource::Metadata);
        // orthogonal vectors: no content sections, only the measured title
        assert_eq!(matches[0].similar_sections.iter().collect::<Vec<_>>(), vec![&SimilarSection::Title]);
    }

    #[test]
    fn test_metadata_only_tags_need_shared_fields() {
        let config = SimilarityConfig {
            weights: FieldWeights { title: 1.0, problem_statement: 0.0, objectives: 0.0, department: 0.0 },
            ..SimilarityConfig::default()
        };
        let engine = SimilarityEngine::new(&config);
        let query = ExtractedMetadata {
            title: Some("Blockchain Voting".to_string()),
            problem_statement: Some("Paper ballots are slow to count".to_string()),
            ..Default::default()
        };
        let corpus = vec![project("title-only", "Blockchain Voting", vec![])];

        let matches = engine.scan_corpus(&[], &query, &corpus, 10);
        assert_eq!(matches[0].similarity_percentage, 100);
        assert_eq!(matches[0].similar_sections.iter().collect::<Vec<_>>(), vec![&SimilarSection::Title]);
    }

    #[test]
    fn test_display_and_store_thresholds_differ() {
        let config = SimilarityConfig::default();
        let engine = SimilarityEngine::new(&config);
        // cos = 0.15 -> 15%: shown, not recorded
        let corpus = vec![project("p1", "Weak", vec![0.15, (1.0f32 - 0.15 * 0.15).sqrt()])];
        let matches = engine.find_display_matches(&[1.0, 0.0], &ExtractedMetadata::default(), &corpus);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity_percentage, 15);
        assert!(engine.recordable(&matches).is_empty());
    }
}
