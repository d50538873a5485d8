// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Read-only access to the corpus of previously stored projects.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::metadata::ExtractedMetadata;

/// A stored project as seen by the similarity engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorpusProject {
    pub id: String,
    pub title: String,
    pub department: Option<String>,
    pub year: Option<String>,
    pub problem_statement: Option<String>,
    pub objectives: Vec<String>,
    pub embedding: Vec<f32>,
}

impl CorpusProject {
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    /// Metadata view used by the weighted similarity and the recommendation prompt.
    pub fn as_metadata(&self) -> ExtractedMetadata {
        ExtractedMetadata {
            title: Some(self.title.clone()).filter(|t| !t.trim().is_empty()),
            department: self.department.clone(),
            academic_year: self.year.clone(),
            problem_statement: self.problem_statement.clone(),
            objectives: self.objectives.clone(),
            ..Default::default()
        }
    }
}

/// Corpus collaborator. This crate only ever reads from it.
pub trait CorpusStore: Send + Sync {
    fn projects(&self) -> Result<Vec<CorpusProject>>;
}

/// Corpus snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    projects: Vec<CorpusProject>,
}

impl InMemoryCorpus {
    pub fn new(projects: Vec<CorpusProject>) -> Self {
        Self { projects }
    }

    /// Load a JSON array of project records.
    pub fn from_json(raw: &str) -> Result<Self> {
        let projects: Vec<CorpusProject> = serde_json::from_str(raw).context("invalid corpus JSON")?;
        let with_embeddings = projects.iter().filter(|p| p.has_embedding()).count();
        info!("[corpus] Loaded {} projects ({} with embeddings)", projects.len(), with_embeddings);
        Ok(Self { projects })
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl CorpusStore for InMemoryCorpus {
    fn projects(&self) -> Result<Vec<CorpusProject>> {
        Ok(self.projects.clone())
    }
}
