// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Proposal similarity and recommendation engine.
//!
//! Takes an uploaded project proposal, extracts its metadata, embeds it,
//! compares it against a corpus of stored projects and produces improvement
//! recommendations. See [`api::pipeline::ProposalChecker`] for the entry point.

pub mod api;

pub use api::error::EngineError;
pub use api::pipeline::{ProposalChecker, SimilarityCheckResult};
