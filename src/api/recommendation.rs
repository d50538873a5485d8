// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Improvement recommendations from a generative model.
//!
//! The model reply is free text. It is parsed with a chain of strategies
//! (numbered list, bullet list, paragraphs, whole reply), bounded to 3..=7
//! items and passed through [`recommendation_repair`]. Any service failure
//! yields the fixed fallback list instead, so `generate` never fails.
//!
//! [`recommendation_repair`]: crate::api::recommendation_repair

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::api::corpus::CorpusProject;
use crate::api::error::EngineError;
use crate::api::metadata::ExtractedMetadata;
use crate::api::provider::{GenerationRequest, TextGenerator};
use crate::api::recommendation_repair::repair_all;
use crate::api::similarity::SimilarityCandidate;

pub const MIN_RECOMMENDATIONS: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 7;
/// Sentence re-split keeps at most this many items.
const MAX_SENTENCE_ITEMS: usize = 5;
/// Replies at least this long are worth re-splitting into sentences.
const LONG_REPLY_CHARS: usize = 200;
/// Minimum length for a paragraph, sentence or whole reply to count as an item.
const MIN_ITEM_CHARS: usize = 20;

const FALLBACK_RECOMMENDATIONS: [&str; 5] = [
    "State the specific problem your project solves and who is affected by it, using evidence from your context.",
    "Write each objective so that it is specific and measurable, and say how you will know it has been achieved.",
    "Describe your methodology in detail, including the tools, data sources and development approach you will use.",
    "Define how you will test and evaluate the finished system, with concrete success criteria.",
    "Explain what makes your project different from existing solutions and why that difference matters.",
];

static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:\*\*)?\d{1,2}\s*[.):](?:\*\*)?\s+(.*)$").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-*•+]\s+(.*)$").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static LEAD_IN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\*\*|__)([^*_\n]{1,60}?)\s*:\s*(?:\*\*|__)\s*|^(?:\*\*|__)([^*_\n]{1,60}?)(?:\*\*|__)\s*:\s*").unwrap());
static EMPHASIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__|`").unwrap());
static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#{1,6}\s*").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A similar project as presented to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarProjectContext {
    pub metadata: ExtractedMetadata,
    pub similarity_percentage: u8,
}

impl SimilarProjectContext {
    /// Combine a ranked match with its corpus record, when the record is still available.
    pub fn from_match(candidate: &SimilarityCandidate, project: Option<&CorpusProject>) -> Self {
        let metadata = match project {
            Some(p) => p.as_metadata(),
            None => ExtractedMetadata {
                title: Some(candidate.title.clone()),
                department: candidate.department.clone(),
                academic_year: candidate.year.clone(),
                ..Default::default()
            },
        };
        Self { metadata, similarity_percentage: candidate.similarity_percentage }
    }
}

fn push_fields(out: &mut String, metadata: &ExtractedMetadata) {
    out.push_str(&format!("Title: {}\n", metadata.title_text().unwrap_or("(not provided)")));
    if let Some(department) = metadata.department_text() {
        out.push_str(&format!("Department: {}\n", department));
    }
    if let Some(ps) = metadata.problem_statement_text() {
        out.push_str(&format!("Problem Statement: {}\n", ps));
    }
    let objectives: Vec<&str> = metadata.objective_items().collect();
    if !objectives.is_empty() {
        out.push_str("Objectives:\n");
        for objective in objectives {
            out.push_str(&format!("- {}\n", objective));
        }
    }
}

pub fn build_recommendation_prompt(proposal: &ExtractedMetadata, similar: &[SimilarProjectContext]) -> String {
    let mut prompt = String::from(
        "You are an experienced final-year project supervisor reviewing a new project proposal.\n\n\
         NEW PROPOSAL\n",
    );
    push_fields(&mut prompt, proposal);

    if similar.is_empty() {
        prompt.push_str("\nNo closely similar past projects were found.\n");
    } else {
        prompt.push_str("\nSIMILAR PAST PROJECTS\n");
        for (i, project) in similar.iter().enumerate() {
            prompt.push_str(&format!("\nProject {} ({}% similar)\n", i + 1, project.similarity_percentage));
            push_fields(&mut prompt, &project.metadata);
        }
    }

    prompt.push_str(
        "\nCompare the new proposal with the past projects. Identify where they overlap, \
         extract the patterns they have in common, find gaps the new proposal leaves open, \
         suggest how it can be differentiated, and flag risks to its completion.\n\
         Reply with a numbered list of 3 to 7 recommendations. Each item must be 1 to 3 complete \
         sentences with a concrete action. Name past projects by their title, never as \"Project 1\" \
         or \"similar projects\".",
    );
    prompt
}

fn clean_item(raw: &str) -> String {
    let joined = SPACES_RE.replace_all(raw.trim(), " ");
    let without_heading = HEADING_RE.replace(&joined, "");
    let without_lead_in = LEAD_IN_RE.replace(&without_heading, "").into_owned();
    let body = if without_lead_in.trim().is_empty() { without_heading.into_owned() } else { without_lead_in };
    EMPHASIS_RE.replace_all(&body, "").trim().to_string()
}

/// Group lines into items: a marker line starts an item, following lines extend it.
fn marker_items(reply: &str, marker: &Regex) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    for line in reply.lines() {
        if let Some(caps) = marker.captures(line) {
            if let Some(done) = current.take() {
                items.push(done);
            }
            current = Some(caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string());
        } else if let Some(item) = current.as_mut() {
            if !line.trim().is_empty() {
                item.push(' ');
                item.push_str(line.trim());
            }
        }
    }
    if let Some(done) = current {
        items.push(done);
    }
    items.iter().map(|i| clean_item(i)).filter(|i| !i.is_empty()).collect()
}

fn paragraph_items(reply: &str) -> Vec<String> {
    BLANK_LINES_RE
        .split(reply)
        .map(clean_item)
        .filter(|p| p.chars().count() >= MIN_ITEM_CHARS && !p.ends_with(':'))
        .collect()
}

fn sentence_items(reply: &str) -> Vec<String> {
    let flattened: String = reply
        .lines()
        .map(|line| {
            let stripped = NUMBERED_RE
                .captures(line)
                .or_else(|| BULLET_RE.captures(line))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str())
                .unwrap_or(line);
            clean_item(stripped)
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    flattened
        .unicode_sentences()
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_ITEM_CHARS)
        .take(MAX_SENTENCE_ITEMS)
        .map(str::to_string)
        .collect()
}

/// Parse a free-text reply into recommendation items (before repair).
///
/// May return fewer than three items; `RecommendationGenerator::generate`
/// tops the list up.
pub fn parse_recommendations(reply: &str) -> Vec<String> {
    let reply = reply.trim();
    if reply.is_empty() {
        return Vec::new();
    }

    let mut items = marker_items(reply, &NUMBERED_RE);
    if items.is_empty() {
        items = marker_items(reply, &BULLET_RE);
    }
    if items.is_empty() {
        items = paragraph_items(reply);
    }
    if items.is_empty() {
        let whole = clean_item(reply);
        if whole.chars().count() >= MIN_ITEM_CHARS {
            items.push(whole);
        }
    }

    if items.len() > MAX_RECOMMENDATIONS {
        items.truncate(MAX_RECOMMENDATIONS);
    } else if items.len() < MIN_RECOMMENDATIONS && reply.chars().count() >= LONG_REPLY_CHARS {
        let sentences = sentence_items(reply);
        if sentences.len() > items.len() {
            debug!("[recommendation] Re-split {} items into {} sentences", items.len(), sentences.len());
            items = sentences;
        }
    }
    items
}

/// The fixed list used when the model is unavailable.
pub fn fallback_recommendations(similar: &[SimilarProjectContext]) -> Vec<String> {
    let mut items: Vec<String> = FALLBACK_RECOMMENDATIONS.iter().map(|s| s.to_string()).collect();
    if let Some(title) = similar.first().and_then(|p| p.metadata.title_text()) {
        items.push(format!(
            "Study the past project \"{}\" closely and make clear how your proposal goes beyond it.",
            title
        ));
    }
    items
}

fn top_up(mut items: Vec<String>) -> Vec<String> {
    for generic in FALLBACK_RECOMMENDATIONS {
        if items.len() >= MIN_RECOMMENDATIONS {
            break;
        }
        if !items.iter().any(|i| i == generic) {
            items.push(generic.to_string());
        }
    }
    items
}

pub struct RecommendationGenerator<'a> {
    generator: &'a dyn TextGenerator,
}

impl<'a> RecommendationGenerator<'a> {
    pub fn new(generator: &'a dyn TextGenerator) -> Self {
        Self { generator }
    }

    /// 3 to 7 recommendations for `proposal`. Never fails.
    pub fn generate(&self, proposal: &ExtractedMetadata, similar: &[SimilarProjectContext]) -> Vec<String> {
        let prompt = build_recommendation_prompt(proposal, similar);
        let reply = match self.generator.generate_text(&GenerationRequest::text(&prompt)) {
            Ok(reply) => reply,
            Err(e) => {
                let err = EngineError::GenerationService(format!("{:#}", e));
                warn!("[recommendation] {}; using fallback recommendations", err);
                return fallback_recommendations(similar);
            }
        };

        let parsed = parse_recommendations(&reply);
        if parsed.is_empty() {
            warn!("[recommendation] Reply had no usable content ({} chars); using fallback", reply.len());
            return fallback_recommendations(similar);
        }

        let mut items = top_up(repair_all(&parsed));
        items.truncate(MAX_RECOMMENDATIONS);
        info!("[recommendation] Generated {} recommendations", items.len());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reply(&'static str);

    impl TextGenerator for Reply {
        fn generate_text(&self, _request: &GenerationRequest) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    impl TextGenerator for Unreachable {
        fn generate_text(&self, _request: &GenerationRequest) -> anyhow::Result<String> {
            anyhow::bail!("connection reset by peer")
        }
    }

    fn similar() -> Vec<SimilarProjectContext> {
        vec![SimilarProjectContext {
            metadata: ExtractedMetadata { title: Some("E-Voting System".to_string()), ..Default::default() },
            similarity_percentage: 85,
        }]
    }

    #[test]
    fn test_numbered_multiline_items() {
        let reply = "Here are my recommendations:\n\n\
                     1. **Gap:** Add a threat model\n   covering coercion attacks.\n\
                     2) Pilot the system with one faculty election.\n\
                     3. Compare throughput with E-Voting System.\n";
        let items = parse_recommendations(reply);
        assert_eq!(
            items,
            vec![
                "Add a threat model covering coercion attacks.",
                "Pilot the system with one faculty election.",
                "Compare throughput with E-Voting System.",
            ]
        );
    }

    #[test]
    fn test_bullets_when_no_numbers() {
        let items = parse_recommendations("- First concrete action item\n* Second concrete action item\n• Third one here");
        assert_eq!(items.len(), 3);
        assert_eq!(items[2], "Third one here");
    }

    #[test]
    fn test_paragraphs_when_no_list() {
        let items = parse_recommendations("Narrow the scope to one campus.\n\nAdd usability testing with students.\n\n");
        assert_eq!(items, vec!["Narrow the scope to one campus.", "Add usability testing with students."]);
    }

    #[test]
    fn test_truncates_to_seven() {
        let reply = (1..=10).map(|i| format!("{}. Recommendation number {}", i, i)).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_recommendations(&reply).len(), MAX_RECOMMENDATIONS);
    }

    #[test]
    fn test_long_single_item_is_resplit_into_sentences() {
        let reply = "1. Define the voter registration workflow in detail before building anything. \
                     Add an audit trail that lets observers verify each tally independently. \
                     Run a pilot election with a small department to measure usability. \
                     Document how the system handles network outages during voting. \
                     Plan for key management so that no single administrator can alter results. \
                     Compare your design against two published e-voting schemes.";
        let items = parse_recommendations(reply);
        assert_eq!(items.len(), MAX_SENTENCE_ITEMS);
        assert!(items[0].starts_with("Define the voter registration workflow"));
    }

    #[test]
    fn test_short_trivial_reply_is_empty() {
        assert!(parse_recommendations("ok").is_empty());
        assert!(parse_recommendations("   ").is_empty());
    }

    #[test]
    fn test_generate_counts_stay_in_bounds() {
        let short = RecommendationGenerator::new(&Reply("1. Add role-based access control to the admin panel"))
            .generate(&ExtractedMetadata::default(), &similar());
        assert!(short.len() >= MIN_RECOMMENDATIONS && short.len() <= MAX_RECOMMENDATIONS);
        assert_eq!(short[0], "Add role-based access control to the admin panel.");

        let long_reply: &'static str = "1. a item one\n2. b item two\n3. c item three\n4. d item four\n5. e item five\n6. f item six\n7. g item seven\n8. h item eight\n9. i item nine";
        let long = RecommendationGenerator::new(&Reply(long_reply)).generate(&ExtractedMetadata::default(), &[]);
        assert_eq!(long.len(), MAX_RECOMMENDATIONS);
    }

    #[test]
    fn test_generate_repairs_items() {
        let reply = "1. Strengthen your data collection plan using Similar Projects\n\
                     2. Evaluate response times with\n\
                     3. Add an accessibility review of the ballot screens";
        let items = RecommendationGenerator::new(&Reply(reply)).generate(&ExtractedMetadata::default(), &[]);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.ends_with('.')));
        assert!(!items[0].to_lowercase().contains("similar project"));
        assert_eq!(items[1], "Evaluate response times with a clearly defined scope and deliverables.");
    }

    #[test]
    fn test_generate_repairs_every_sentence() {
        let reply = "1. Improve your data collection plan using Similar Projects. Then run a pilot with ten users.\n\
                     2. Evaluate response times with. Add caching for the tally service.\n\
                     3. Similar Projects.";
        let items = RecommendationGenerator::new(&Reply(reply)).generate(&ExtractedMetadata::default(), &[]);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| !i.to_lowercase().contains("similar project")), "{:?}", items);
        assert!(items[0].ends_with("field observation. Then run a pilot with ten users."));
        assert_eq!(
            items[1],
            "Evaluate response times with a clearly defined scope and deliverables. Add caching for the tally service."
        );
        assert_eq!(items[2], FALLBACK_RECOMMENDATIONS[0]);
    }

    #[test]
    fn test_fallback_without_similar_projects() {
        let items = RecommendationGenerator::new(&Unreachable).generate(&ExtractedMetadata::default(), &[]);
        assert_eq!(items.len(), 5);
    }

    #[test]
    fn test_fallback_names_top_project() {
        let items = RecommendationGenerator::new(&Unreachable).generate(&ExtractedMetadata::default(), &similar());
        assert_eq!(items.len(), 6);
        assert!(items[5].contains("\"E-Voting System\""));
    }

    #[test]
    fn test_prompt_includes_percentages_and_fields() {
        let proposal = ExtractedMetadata {
            title: Some("Blockchain Voting".to_string()),
            objectives: vec!["To design a ledger".to_string()],
            ..Default::default()
        };
        let prompt = build_recommendation_prompt(&proposal, &similar());
        assert!(prompt.contains("Title: Blockchain Voting"));
        assert!(prompt.contains("- To design a ledger"));
        assert!(prompt.contains("(85% similar)"));
        assert!(prompt.contains("Title: E-Voting System"));
        assert!(prompt.contains("numbered list"));
    }
}
