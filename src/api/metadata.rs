// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Proposal metadata: the merged view of local and model-based extraction.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::api::config::ExtractionConfig;
use crate::api::error::EngineError;
use crate::api::metadata_ai;
use crate::api::metadata_rules;
use crate::api::provider::TextGenerator;

/// Structured fields extracted from a proposal document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub supervisor: Option<String>,
    pub students: Vec<String>,
    pub academic_year: Option<String>,
    pub department: Option<String>,
    pub problem_statement: Option<String>,
    pub objectives: Vec<String>,
}

/// Closed department vocabulary shared by both extractors.
pub const DEPARTMENTS: [&str; 9] = [
    "Computer Science",
    "Information Technology",
    "Software Engineering",
    "Computer Engineering",
    "Information Systems",
    "Data Science",
    "Cybersecurity",
    "Electrical Engineering",
    "Other",
];

/// Required field names, in the spelling reported to callers.
pub const REQUIRED_FIELDS: [&str; 3] = ["title", "problemStatement", "objectives"];

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ExtractedMetadata {
    pub fn title_text(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn problem_statement_text(&self) -> Option<&str> {
        non_blank(&self.problem_statement)
    }

    pub fn department_text(&self) -> Option<&str> {
        non_blank(&self.department)
    }

    /// Objectives with blank entries dropped.
    pub fn objective_items(&self) -> impl Iterator<Item = &str> {
        self.objectives.iter().map(|o| o.trim()).filter(|o| !o.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        *self == ExtractedMetadata::default()
    }
}

/// External text wins only when it is usable.
fn prefer_text(local: &Option<String>, external: &Option<String>) -> Option<String> {
    match non_blank(external) {
        Some(text) => Some(text.to_string()),
        None => local.clone(),
    }
}

fn prefer_list(local: &[String], external: &[String]) -> Vec<String> {
    let usable: Vec<String> = external
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if usable.is_empty() {
        local.to_vec()
    } else {
        usable
    }
}

/// Merge the two extraction results into a new value.
///
/// Local extraction is the baseline; each external field replaces it only when
/// non-null and non-empty after trimming (arrays: at least one non-blank item).
pub fn merge_metadata(local: &ExtractedMetadata, external: &ExtractedMetadata) -> ExtractedMetadata {
    ExtractedMetadata {
        title: prefer_text(&local.title, &external.title),
        supervisor: prefer_text(&local.supervisor, &external.supervisor),
        students: prefer_list(&local.students, &external.students),
        academic_year: prefer_text(&local.academic_year, &external.academic_year),
        department: prefer_text(&local.department, &external.department),
        problem_statement: prefer_text(&local.problem_statement, &external.problem_statement),
        objectives: prefer_list(&local.objectives, &external.objectives),
    }
}

/// Names of required fields that are absent.
pub fn missing_required_fields(metadata: &ExtractedMetadata) -> Vec<String> {
    let mut missing = Vec::new();
    if metadata.title_text().is_none() {
        missing.push(REQUIRED_FIELDS[0].to_string());
    }
    if metadata.problem_statement_text().is_none() {
        missing.push(REQUIRED_FIELDS[1].to_string());
    }
    if metadata.objective_items().next().is_none() {
        missing.push(REQUIRED_FIELDS[2].to_string());
    }
    missing
}

/// Gate before any embedding work.
pub fn validate_metadata(metadata: &ExtractedMetadata) -> Result<(), EngineError> {
    let missing = missing_required_fields(metadata);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation { missing })
    }
}

/// Run both extractors over `text` and merge the results.
///
/// The model-based extractor never fails; on any problem it contributes nothing
/// and the local result stands alone.
pub fn extract_metadata(
    text: &str,
    generator: Option<&dyn TextGenerator>,
    config: &ExtractionConfig,
) -> ExtractedMetadata {
    let local = metadata_rules::extract_local(text, config.problem_statement_max_words);
    debug!(
        "[metadata] Local extraction: title={}, objectives={}, students={}",
        local.title.is_some(),
        local.objectives.len(),
        local.students.len()
    );

    let external = match generator {
        Some(generator) => metadata_ai::extract_with_model(text, generator, config.ai_excerpt_chars),
        None => ExtractedMetadata::default(),
    };

    let merged = merge_metadata(&local, &external);
    info!(
        "[metadata] Merged metadata (model contributed: {}), missing required: {:?}",
        !external.is_empty(),
        missing_required_fields(&merged)
    );
    merged
}
