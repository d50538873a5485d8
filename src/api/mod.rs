// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT

pub mod config;
pub mod error;
pub mod logger;
pub mod document_parser;
pub mod ocr;
pub mod metadata;
pub(crate) mod metadata_rules;
pub(crate) mod metadata_ai;
pub mod provider;
pub mod openai;
pub mod embedding;
pub mod corpus;
pub mod similarity;
pub mod recommendation;
pub(crate) mod recommendation_repair;
pub mod pipeline;
