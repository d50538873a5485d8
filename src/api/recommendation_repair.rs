// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Deterministic clean-up of generated recommendation items.
//!
//! Generated lists often end sentences on a bare "Similar Projects" reference
//! or stop mid-sentence on a preposition. Every sentence of an item goes
//! through two ordered rule tables (first match wins in each) and then gets a
//! closing full stop. A sentence that is nothing but the reference is dropped.
//! New rules are added by extending a table.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// A dangling reference rewrite, chosen when any keyword occurs in the rest of the item.
struct ReferenceRule {
    keywords: &'static [&'static str],
    completion: &'static str,
}

/// A continuation appended after an item that ends on `trailing`.
struct ContinuationRule {
    trailing: &'static str,
    continuation: &'static str,
}

// The final rule has no keywords and always applies.
const REFERENCE_RULES: &[ReferenceRule] = &[
    ReferenceRule {
        keywords: &["data collection", "collect data", "collecting data", "survey", "questionnaire", "interview"],
        completion: "established data collection methods such as structured questionnaires, interviews and field observation",
    },
    ReferenceRule {
        keywords: &["dataset", "data set", "training data", "corpus", "labelled data", "labeled data"],
        completion: "publicly available datasets of sufficient size and quality for the task",
    },
    ReferenceRule {
        keywords: &["algorithm", "model", "machine learning", "classifier", "neural", "prediction"],
        completion: "benchmark algorithms evaluated on comparable problems, justifying the chosen model against them",
    },
    ReferenceRule {
        keywords: &["user interface", "interface", "usability", "user experience", "front-end", "frontend", "ui "],
        completion: "recognised usability guidelines and accessible interface design patterns",
    },
    ReferenceRule {
        keywords: &["security", "authentication", "encryption", "privacy", "access control"],
        completion: "recognised security practices such as encrypted storage, strong authentication and audit logging",
    },
    ReferenceRule {
        keywords: &["testing", "test ", "tests", "evaluation", "evaluate", "validation", "metric", "accuracy"],
        completion: "a clear evaluation plan with measurable success criteria and concrete test cases",
    },
    ReferenceRule {
        keywords: &["architecture", "system design", "component", "scalab", "database", "backend", "back-end"],
        completion: "a documented system architecture showing the main components and how they interact",
    },
    ReferenceRule {
        keywords: &[],
        completion: "current published work in the same area, stating clearly what your project does differently",
    },
];

// Multi-word endings come first.
const CONTINUATION_RULES: &[ContinuationRule] = &[
    ContinuationRule { trailing: "such as", continuation: "those reported in recent literature" },
    ContinuationRule { trailing: "like", continuation: "those reported in recent literature" },
    ContinuationRule { trailing: "by", continuation: "following a clearly documented procedure" },
    ContinuationRule { trailing: "with", continuation: "a clearly defined scope and deliverables" },
    ContinuationRule { trailing: "from", continuation: "reliable and well-documented sources" },
    ContinuationRule { trailing: "and", continuation: "document the outcome in your proposal" },
    ContinuationRule { trailing: "or", continuation: "an equivalent, well-justified alternative" },
    ContinuationRule { trailing: "to", continuation: "the stated objectives of the project" },
    ContinuationRule { trailing: "for", continuation: "the intended users of the system" },
    ContinuationRule { trailing: "in", continuation: "the context of your project" },
    ContinuationRule { trailing: "on", continuation: "the core requirements of the project" },
    ContinuationRule { trailing: "at", continuation: "each stage of the project" },
    ContinuationRule { trailing: "of", continuation: "the proposed system" },
];

// Endings that look like a dangling preposition but are complete phrasal verbs.
const PHRASAL_ENDINGS: &[&str] = &["log in", "sign in", "log on", "opt in", "logged in", "signed in", "and so on", "carry on", "plug in"];

static DANGLING_REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*,?\s*(?:(?P<lead>compared\s+(?:to|with)|(?:used|seen|found|done)\s+in|as\s+in|in|from|of|like|to|with|by|for|than|across|among|using|via|through|within)\s+)?(?:(?:the|these|those|other|such|existing|previous)\s+)*(?:similar\s+projects?|(?:these|those|other|existing|previous)\s+projects?)\s*[.!?:;,]*\s*$",
    )
    .unwrap()
});
static BARE_PROJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*,?\s*(?P<lead>compared\s+(?:to|with)|(?:used|seen|found|done)\s+in|as\s+in|in|from|like|with|than|using|via)\s+projects?\s*[.!?:;,]*\s*$")
        .unwrap()
});
static TRAILING_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?P<word>such\s+as|by|with|from|like|and|or|to|for|in|on|at|of)\s*[.!?:;,]*\s*$").unwrap()
});
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Rewrite a trailing reference to "similar projects" that names nothing concrete.
fn repair_dangling_reference(item: &str) -> Option<String> {
    let caps = DANGLING_REFERENCE_RE
        .captures(item)
        .or_else(|| BARE_PROJECT_RE.captures(item))?;
    let whole = caps.get(0)?;
    let head = item[..whole.start()].trim_end();
    if head.is_empty() {
        return None;
    }

    let context = head.to_lowercase();
    let rule = REFERENCE_RULES
        .iter()
        .find(|r| r.keywords.is_empty() || r.keywords.iter().any(|k| context.contains(k)))?;

    let repaired = match caps.name("lead") {
        Some(lead) => format!("{} {} {}", head, lead.as_str().to_lowercase(), rule.completion),
        None => format!("{}, drawing on {}", head.trim_end_matches([',', ';', ':']), rule.completion),
    };
    debug!("[recommendation_repair] Replaced dangling project reference");
    Some(repaired)
}

/// Complete an item that stops on a preposition or conjunction.
fn repair_trailing_word(item: &str) -> Option<String> {
    let lowered = item.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace()).to_lowercase();
    if PHRASAL_ENDINGS.iter().any(|p| lowered.ends_with(p)) {
        return None;
    }

    let caps = TRAILING_WORD_RE.captures(item)?;
    let word = caps.name("word")?;
    let normalized = WHITESPACE_RE.replace_all(&word.as_str().to_lowercase(), " ").into_owned();
    let rule = CONTINUATION_RULES.iter().find(|r| r.trailing == normalized)?;

    let head = item[..word.end()].trim_end();
    debug!("[recommendation_repair] Completed item ending on '{}'", normalized);
    Some(format!("{} {}", head, rule.continuation))
}

fn ensure_full_stop(item: &str) -> String {
    let trimmed = item.trim().trim_end_matches([',', ';', ':', '-']).trim_end();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}

/// True when the sentence holds nothing besides a project reference.
fn is_bare_reference(sentence: &str) -> bool {
    [&*DANGLING_REFERENCE_RE, &*BARE_PROJECT_RE].iter().any(|re| {
        re.find(sentence)
            .is_some_and(|m| sentence[..m.start()].trim().is_empty())
    })
}

fn repair_sentence(sentence: &str) -> Option<String> {
    let mut current = sentence.trim().to_string();
    if current.is_empty() {
        return None;
    }
    if is_bare_reference(&current) {
        debug!("[recommendation_repair] Dropped bare project reference");
        return None;
    }
    if let Some(fixed) = repair_dangling_reference(&current) {
        current = fixed;
    }
    if let Some(fixed) = repair_trailing_word(&current) {
        current = fixed;
    }
    Some(ensure_full_stop(&current))
}

/// Apply the reference rules, then the continuation rules, then punctuation,
/// sentence by sentence. Returns an empty string when no sentence survives.
pub fn repair_recommendation(item: &str) -> String {
    let sentences: Vec<String> = item.trim().unicode_sentences().filter_map(repair_sentence).collect();
    sentences.join(" ")
}

pub fn repair_all(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| repair_recommendation(item))
        .filter(|item| item.len() > 1)
        .collect()
}
