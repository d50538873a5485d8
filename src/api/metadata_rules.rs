// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Local, pattern-based metadata extraction.
//!
//! Each field has an ordered list of pure rules `fn(&str) -> Option<T>`; the
//! first rule that produces a value wins. New patterns are added by appending
//! a function to the relevant list.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::metadata::{ExtractedMetadata, DEPARTMENTS};

type Rule<T> = fn(&str) -> Option<T>;

const TITLE_RULES: &[Rule<String>] = &[labeled_title, title_before_submitted_by, uppercase_title_near_top];
const SUPERVISOR_RULES: &[Rule<String>] = &[labeled_supervisor, supervision_phrase, supervisor_label_line];
const STUDENT_RULES: &[Rule<Vec<String>>] = &[student_block, name_labels];
const YEAR_RULES: &[Rule<String>] = &[labeled_academic_year, year_range_anywhere, standalone_year_line];
const DEPARTMENT_RULES: &[Rule<String>] = &[department_of, labeled_department, school_of];
const PROBLEM_RULES: &[Rule<String>] = &[problem_statement_section];
const OBJECTIVE_RULES: &[Rule<Vec<String>>] = &[objectives_section];

const MAX_STUDENTS: usize = 10;
const MAX_OBJECTIVES: usize = 10;
const TITLE_SCAN_LINES: usize = 15;

/// Section headings recognized when slicing sections out of the body.
const SECTION_HEADINGS: &[&str] = &[
    "abstract",
    "introduction",
    "background",
    "background of the study",
    "background to the study",
    "problem statement",
    "statement of the problem",
    "statement of problem",
    "problem definition",
    "research problem",
    "objectives",
    "aims and objectives",
    "aim and objectives",
    "aims",
    "aim",
    "specific objectives",
    "general objective",
    "main objective",
    "project objectives",
    "research objectives",
    "objectives of the study",
    "objectives of the project",
    "scope",
    "scope of the study",
    "scope of the project",
    "significance of the study",
    "significance of the project",
    "justification",
    "motivation",
    "methodology",
    "research methodology",
    "proposed methodology",
    "literature review",
    "related work",
    "research questions",
    "hypothesis",
    "expected outcomes",
    "expected results",
    "limitations",
    "limitation of the study",
    "definition of terms",
    "organization of the report",
    "system requirements",
    "timeline",
    "project schedule",
    "budget",
    "conclusion",
    "references",
    "bibliography",
    "table of contents",
    "acknowledgement",
    "acknowledgements",
    "dedication",
    "declaration",
    "certification",
    "approval",
];

const PROBLEM_HEADINGS: &[&str] = &[
    "problem statement",
    "statement of the problem",
    "statement of problem",
    "problem definition",
    "research problem",
];

const OBJECTIVE_HEADINGS: &[&str] = &[
    "objectives",
    "aims and objectives",
    "aim and objectives",
    "specific objectives",
    "general objective",
    "main objective",
    "project objectives",
    "research objectives",
    "objectives of the study",
    "objectives of the project",
];

/// Cover-page phrases that are never a title or a student name.
const BOILERPLATE: &[&str] = &[
    "university",
    "faculty of",
    "department of",
    "school of",
    "college",
    "institute",
    "polytechnic",
    "partial fulfil",
    "bachelor",
    "degree",
    "submitted to",
    "project proposal",
    "project report",
    "project submitted",
    "final year",
    "supervis",
    "in fulfil",
    "award of",
    "copyright",
];

static HEADING_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:chapter\s+(?:\d+|[ivx]+|one|two|three)\s*[:.\-]?\s*|(?:\d+(?:\.\d+)*|[ivx]+)[.)]?\s+)").unwrap()
});
static LABELED_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:project\s+title|title\s+of\s+(?:the\s+)?project|project\s+topic|topic|title)\s*[:\-–]\s*(.+)$").unwrap()
});
static SUBMITTED_BY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:submitted|presented|prepared|written)\s+by\b").unwrap());
static LABELED_SUPERVISOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:project\s+)?(?:supervisor|supervised\s+by|advisor|adviser)\s*(?:[:\-–]\s*|\s+)(\S.*)$").unwrap()
});
static SUPERVISION_PHRASE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)under\s+the\s+(?:supervision|guidance)\s+of\s*[:\-]?\s*([^\n]+)").unwrap());
static SUPERVISOR_LABEL_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:project\s+)?(?:supervisor|advisor|adviser)\s*:?\s*$").unwrap());
static STUDENT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:submitted\s+by|presented\s+by|prepared\s+by|written\s+by|students?|group\s+members|team\s+members|project\s+members|members|authors?)\s*(?:[:\-–]\s*(.*))?$",
    )
    .unwrap()
});
static NAME_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:student(?:'s)?\s+)?name\s*:\s*(.+)$").unwrap());
static REG_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:reg(?:istration)?\.?\s*(?:no|number|num)\.?|matric(?:ulation)?\.?\s*(?:no|number)\.?|student\s+id|id\s*no\.?|index\s+no\.?)\s*[:\-]?").unwrap()
});
static NAME_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*(?:,|;|&|\band\b|\t|\s{3,})\s*").unwrap());
static LABELED_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:academic\s+year|academic\s+session|session)\s*[:\-]?\s*((?:19|20)\d{2})\s*[/\-–]\s*(\d{2,4})").unwrap()
});
static YEAR_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\s*[/\-–]\s*((?:19|20)\d{2})\b").unwrap());
static STANDALONE_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:(?:january|february|march|april|may|june|july|august|september|october|november|december)\s*,?\s*)?((?:19|20)\d{2})\s*$").unwrap()
});
static DEPARTMENT_OF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdepartment\s+of\s+([A-Za-z][A-Za-z &]+)").unwrap());
static LABELED_DEPARTMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*(?:department|dept\.?)\s*[:\-–]\s*(.+)$").unwrap());
static SCHOOL_OF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bschool\s+of\s+([A-Za-z][A-Za-z &]+)").unwrap());
static LIST_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\(?\d{1,2}[.)]|\(?[a-hA-H][.)]|\(?(?:i{1,3}|iv|v|vi{1,3}|ix|x)[.)]|[-•*●▪◦➢►])\s+(.+)$").unwrap()
});
static TO_CLAUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bto\s+[a-z]").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Run every field's rule list over `text`.
pub fn extract_local(text: &str, problem_statement_max_words: usize) -> ExtractedMetadata {
    ExtractedMetadata {
        title: first_match(text, TITLE_RULES),
        supervisor: first_match(text, SUPERVISOR_RULES),
        students: first_match(text, STUDENT_RULES).unwrap_or_default(),
        academic_year: first_match(text, YEAR_RULES),
        department: first_match(text, DEPARTMENT_RULES),
        problem_statement: first_match(text, PROBLEM_RULES)
            .map(|ps| cap_words(&ps, problem_statement_max_words)),
        objectives: first_match(text, OBJECTIVE_RULES).unwrap_or_default(),
    }
}

fn first_match<T>(text: &str, rules: &[Rule<T>]) -> Option<T> {
    rules.iter().find_map(|rule| rule(text))
}

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RE.replace_all(s, " ").trim().to_string()
}

fn clean_value(s: &str) -> Option<String> {
    let cleaned = collapse_whitespace(s)
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '_')
        .trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':'))
        .trim()
        .to_string();
    (cleaned.chars().count() >= 2).then_some(cleaned)
}

/// Cap at `max_words`, marking truncation with an ellipsis.
pub fn cap_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    format!("{}...", words[..max_words].join(" ").trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

/// Canonical heading name when `line` is a recognized section heading.
///
/// Accepts numbering prefixes ("1.2", "CHAPTER ONE:") and an inline body after a colon.
fn heading_of(line: &str) -> Option<(&'static str, String)> {
    let stripped = HEADING_PREFIX_RE.replace(line.trim(), "");
    let stripped = stripped.trim().trim_matches(|c: char| c == '*' || c == '#').trim();
    let (head, rest) = match stripped.split_once(':') {
        Some((head, rest)) => (head.trim(), rest.trim().to_string()),
        None => (stripped.trim_end_matches('.').trim(), String::new()),
    };
    let lowered = head.to_lowercase();
    let canonical = SECTION_HEADINGS.iter().find(|h| **h == lowered)?;
    Some((*canonical, rest))
}

fn is_boilerplate(line: &str) -> bool {
    let lowered = line.to_lowercase();
    BOILERPLATE.iter().any(|b| lowered.contains(b))
}

/// Lines following the first heading in `targets`, up to the next foreign heading.
fn slice_section(text: &str, targets: &[&str]) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| heading_of(line).is_some_and(|(h, _)| targets.contains(&h)))?;

    let mut body: Vec<String> = Vec::new();
    if let Some((_, inline)) = heading_of(lines[start]) {
        if !inline.is_empty() {
            body.push(inline);
        }
    }
    for line in &lines[start + 1..] {
        if let Some((heading, inline)) = heading_of(line) {
            if !targets.contains(&heading) {
                break;
            }
            if !inline.is_empty() {
                body.push(inline);
            }
            continue;
        }
        body.push(line.to_string());
    }

    let joined = body.join("\n").trim().to_string();
    (!joined.is_empty()).then_some(joined)
}

fn labeled_title(text: &str) -> Option<String> {
    let caps = LABELED_TITLE_RE.captures(text)?;
    clean_value(caps.get(1)?.as_str()).filter(|t| t.split_whitespace().count() >= 2)
}

fn title_before_submitted_by(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let anchor = lines.iter().position(|l| SUBMITTED_BY_RE.is_match(l))?;

    let mut collected: Vec<&str> = Vec::new();
    for line in lines[..anchor].iter().rev() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if collected.is_empty() {
                continue;
            }
            break;
        }
        if is_boilerplate(trimmed) || heading_of(trimmed).is_some() || collected.len() >= 4 {
            break;
        }
        collected.push(trimmed);
    }
    collected.reverse();
    clean_value(&collected.join(" ")).filter(|t| t.split_whitespace().count() >= 2)
}

fn mostly_uppercase(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 4 {
        return false;
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    upper * 10 >= letters.len() * 7
}

fn uppercase_title_near_top(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(TITLE_SCAN_LINES)
        .find(|line| {
            let len = line.chars().count();
            let digits = line.chars().filter(|c| c.is_ascii_digit()).count();
            (10..=200).contains(&len)
                && line.split_whitespace().count() >= 2
                && digits * 5 < len
                && mostly_uppercase(line)
                && !is_boilerplate(line)
                && heading_of(line).is_none()
                && !SUBMITTED_BY_RE.is_match(line)
        })
        .and_then(clean_value)
}

fn labeled_supervisor(text: &str) -> Option<String> {
    let caps = LABELED_SUPERVISOR_RE.captures(text)?;
    clean_value(caps.get(1)?.as_str())
}

fn supervision_phrase(text: &str) -> Option<String> {
    let caps = SUPERVISION_PHRASE_RE.captures(text)?;
    clean_value(caps.get(1)?.as_str())
}

fn supervisor_label_line(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let idx = lines.iter().position(|l| SUPERVISOR_LABEL_LINE_RE.is_match(l))?;
    lines[idx + 1..]
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .and_then(clean_value)
}

/// A person's name once registration tokens are gone, or `None`.
fn clean_student_name(raw: &str) -> Option<String> {
    let without_labels = REG_LABEL_RE.replace_all(raw, " ");
    let kept: Vec<&str> = without_labels
        .split_whitespace()
        .filter(|token| !token.chars().any(|c| c.is_ascii_digit()))
        .map(|token| token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ',' | ';' | ':' | '-' | '|')))
        .filter(|token| !token.is_empty())
        .collect();
    let name = kept.join(" ");

    let words = name.split_whitespace().count();
    let plausible = (2..=5).contains(&words)
        && name.chars().all(|c| c.is_alphabetic() || matches!(c, ' ' | '.' | '-' | '\''))
        && !is_boilerplate(&name)
        && heading_of(&name).is_none();
    plausible.then_some(name)
}

fn looks_like_label(line: &str) -> bool {
    line.split_once(':').is_some_and(|(head, _)| head.split_whitespace().count() <= 3)
        && !REG_LABEL_RE.is_match(line)
}

fn student_block(text: &str) -> Option<Vec<String>> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| STUDENT_BLOCK_RE.is_match(l))?;

    let mut candidates: Vec<String> = Vec::new();
    if let Some(inline) = STUDENT_BLOCK_RE.captures(lines[start]).and_then(|c| c.get(1)) {
        candidates.push(inline.as_str().to_string());
    }
    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if candidates.iter().any(|c| !c.trim().is_empty()) {
                break;
            }
            continue;
        }
        if heading_of(trimmed).is_some() || looks_like_label(trimmed) || is_boilerplate(trimmed) {
            break;
        }
        candidates.push(trimmed.to_string());
    }

    let mut names: Vec<String> = Vec::new();
    for candidate in &candidates {
        for part in NAME_SPLIT_RE.split(candidate) {
            if let Some(name) = clean_student_name(part) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
    names.truncate(MAX_STUDENTS);
    (!names.is_empty()).then_some(names)
}

fn name_labels(text: &str) -> Option<Vec<String>> {
    let mut names: Vec<String> = NAME_LABEL_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| clean_student_name(m.as_str()))
        .collect();
    names.dedup();
    names.truncate(MAX_STUDENTS);
    (!names.is_empty()).then_some(names)
}

fn format_year_range(start: &str, end: &str) -> Option<String> {
    let start_year: u32 = start.parse().ok()?;
    let end_year: u32 = match end.len() {
        2 => (start_year / 100) * 100 + end.parse::<u32>().ok()?,
        4 => end.parse().ok()?,
        _ => return None,
    };
    (end_year > start_year && end_year - start_year <= 2).then(|| format!("{}/{}", start_year, end_year))
}

fn labeled_academic_year(text: &str) -> Option<String> {
    let caps = LABELED_YEAR_RE.captures(text)?;
    format_year_range(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}

fn year_range_anywhere(text: &str) -> Option<String> {
    YEAR_RANGE_RE
        .captures_iter(text)
        .find_map(|caps| format_year_range(caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

fn standalone_year_line(text: &str) -> Option<String> {
    STANDALONE_YEAR_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Map free-text department names onto the closed vocabulary when possible.
pub fn normalize_department(raw: &str) -> Option<String> {
    let cleaned = clean_value(raw)?;
    let cleaned = cleaned
        .trim_end_matches(|c: char| !c.is_alphabetic())
        .trim_end_matches(" and")
        .trim()
        .to_string();
    let lowered = cleaned.to_lowercase();

    const KEYWORDS: &[(&str, &str)] = &[
        ("computer science", "Computer Science"),
        ("computing", "Computer Science"),
        ("information technology", "Information Technology"),
        ("software", "Software Engineering"),
        ("computer engineering", "Computer Engineering"),
        ("information system", "Information Systems"),
        ("data science", "Data Science"),
        ("cyber", "Cybersecurity"),
        ("electrical", "Electrical Engineering"),
    ];
    if let Some(exact) = DEPARTMENTS.iter().find(|d| d.eq_ignore_ascii_case(&cleaned)) {
        return Some(exact.to_string());
    }
    match KEYWORDS.iter().find(|(key, _)| lowered.contains(key)) {
        Some((_, canonical)) => Some(canonical.to_string()),
        None => (!cleaned.is_empty()).then_some(cleaned),
    }
}

fn department_of(text: &str) -> Option<String> {
    let caps = DEPARTMENT_OF_RE.captures(text)?;
    normalize_department(caps.get(1)?.as_str())
}

fn labeled_department(text: &str) -> Option<String> {
    let caps = LABELED_DEPARTMENT_RE.captures(text)?;
    normalize_department(caps.get(1)?.as_str())
}

fn school_of(text: &str) -> Option<String> {
    let caps = SCHOOL_OF_RE.captures(text)?;
    normalize_department(caps.get(1)?.as_str())
}

fn problem_statement_section(text: &str) -> Option<String> {
    let section = slice_section(text, PROBLEM_HEADINGS)?;
    let collapsed = collapse_whitespace(&section);
    (collapsed.split_whitespace().count() >= 3).then_some(collapsed)
}

fn clean_objective(raw: &str) -> Option<String> {
    let item = collapse_whitespace(raw);
    let item = item
        .trim_end_matches(|c: char| c == ';' || c == ',')
        .trim_end_matches(" and")
        .trim_end_matches(';')
        .trim()
        .to_string();
    (item.chars().count() >= 5).then_some(item)
}

/// Split an objectives section into items: list markers first, then "To ..." clauses, then lines.
fn split_objectives(section: &str) -> Vec<String> {
    let lines: Vec<&str> = section.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut items: Vec<String> = Vec::new();
    let mut saw_marker = false;
    for line in &lines {
        if let Some(caps) = LIST_MARKER_RE.captures(line) {
            saw_marker = true;
            items.push(caps.get(1).map_or("", |m| m.as_str()).to_string());
        } else if saw_marker {
            if let Some(last) = items.last_mut() {
                last.push(' ');
                last.push_str(line);
            }
        }
    }

    if !saw_marker {
        let flat = collapse_whitespace(section);
        let starts: Vec<usize> = TO_CLAUSE_RE
            .find_iter(&flat)
            .map(|m| m.start())
            .filter(|&pos| pos == 0 || flat[..pos].trim_end().ends_with(['.', ';', ':']))
            .collect();
        if starts.len() >= 2 {
            for (i, &start) in starts.iter().enumerate() {
                let end = starts.get(i + 1).copied().unwrap_or(flat.len());
                items.push(flat[start..end].trim().trim_end_matches('.').to_string());
            }
        } else {
            items = lines.iter().map(|l| l.to_string()).collect();
        }
    }

    let mut cleaned: Vec<String> = items
        .iter()
        .filter(|item| !item.trim_end().ends_with(':'))
        .filter_map(|item| clean_objective(item))
        .collect();
    cleaned.truncate(MAX_OBJECTIVES);
    cleaned
}

fn objectives_section(text: &str) -> Option<Vec<String>> {
    let section = slice_section(text, OBJECTIVE_HEADINGS)?;
    let items = split_objectives(&section);
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COVER: &str = "UNIVERSITY OF LAGOS
FACULTY OF SCIENCE
DEPARTMENT OF COMPUTER SCIENCE

DESIGN AND IMPLEMENTATION OF A
BLOCKCHAIN BASED VOTING SYSTEM

SUBMITTED BY
ADEBAYO JOHN OLUWASEUN CSC/2019/045
MARY OKAFOR (CSC/2019/112)

SUPERVISOR: DR. K. ADEWALE
ACADEMIC YEAR: 2023/24

1.1 Problem Statement
Student elections in the university are conducted with paper ballots,
which are slow to count and easy to tamper with.

1.2 Objectives
The specific objectives of this project are to:
1. Design a permissioned blockchain ledger for ballots;
2. Implement a web client for casting votes
   with voter authentication; and
3. Evaluate the system against the paper process.

1.3 Scope of the Study
This project covers student union elections only.
";

    #[test]
    fn test_title_from_block_before_submitted_by() {
        let meta = extract_local(COVER, 150);
        assert_eq!(meta.title.as_deref(), Some("DESIGN AND IMPLEMENTATION OF A BLOCKCHAIN BASED VOTING SYSTEM"));
    }

    #[test]
    fn test_labeled_title_takes_priority() {
        let text = "Project Title: Smart Irrigation Controller\nSUBMITTED BY\nJane Doe";
        assert_eq!(extract_local(text, 150).title.as_deref(), Some("Smart Irrigation Controller"));
    }

    #[test]
    fn test_uppercase_title_heuristic() {
        let text = "AN INTELLIGENT TRAFFIC LIGHT CONTROL SYSTEM\nThis proposal describes a controller.";
        assert_eq!(
            extract_local(text, 150).title.as_deref(),
            Some("AN INTELLIGENT TRAFFIC LIGHT CONTROL SYSTEM")
        );
    }

    #[test]
    fn test_students_strip_registration_numbers() {
        let meta = extract_local(COVER, 150);
        assert_eq!(meta.students, vec!["ADEBAYO JOHN OLUWASEUN", "MARY OKAFOR"]);
    }

    #[test]
    fn test_student_block_rejects_headers() {
        let text = "Submitted by:\nJane Doe, Reg No: 2020/1234\nINTRODUCTION\nSome body text here";
        let meta = extract_local(text, 150);
        assert_eq!(meta.students, vec!["Jane Doe"]);
    }

    #[test]
    fn test_supervisor_and_year() {
        let meta = extract_local(COVER, 150);
        assert_eq!(meta.supervisor.as_deref(), Some("DR. K. ADEWALE"));
        assert_eq!(meta.academic_year.as_deref(), Some("2023/2024"));
    }

    #[test]
    fn test_supervision_phrase() {
        let text = "A project carried out under the supervision of Prof. Ngozi Eze\n";
        assert_eq!(extract_local(text, 150).supervisor.as_deref(), Some("Prof. Ngozi Eze"));
    }

    #[test]
    fn test_department_normalized() {
        assert_eq!(extract_local(COVER, 150).department.as_deref(), Some("Computer Science"));
        assert_eq!(normalize_department("Dept of Cyber Security").as_deref(), Some("Cybersecurity"));
        assert_eq!(normalize_department("Mechanical Engineering").as_deref(), Some("Mechanical Engineering"));
    }

    #[test]
    fn test_problem_statement_sliced_at_next_heading() {
        let meta = extract_local(COVER, 150);
        let ps = meta.problem_statement.unwrap();
        assert!(ps.starts_with("Student elections"));
        assert!(ps.ends_with("tamper with."));
        assert!(!ps.contains("Objectives"));
    }

    #[test]
    fn test_problem_statement_capped_with_ellipsis() {
        let body = "word ".repeat(200);
        let text = format!("Problem Statement\n{}\nObjectives\n1. To build a thing", body);
        let ps = extract_local(&text, 150).problem_statement.unwrap();
        assert_eq!(ps.split_whitespace().count(), 150);
        assert!(ps.ends_with("..."));
    }

    #[test]
    fn test_objectives_numbered_with_continuations() {
        let meta = extract_local(COVER, 150);
        assert_eq!(
            meta.objectives,
            vec![
                "Design a permissioned blockchain ledger for ballots",
                "Implement a web client for casting votes with voter authentication",
                "Evaluate the system against the paper process.",
            ]
        );
    }

    #[test]
    fn test_objectives_to_clauses() {
        let text = "Objectives: To collect soil data. To predict irrigation needs. To alert farmers.\nMethodology\nAgile.";
        let objectives = extract_local(text, 150).objectives;
        assert_eq!(objectives, vec!["To collect soil data", "To predict irrigation needs", "To alert farmers"]);
    }

    #[test]
    fn test_heading_of_variants() {
        assert_eq!(heading_of("CHAPTER ONE: INTRODUCTION").map(|h| h.0), Some("introduction"));
        assert_eq!(heading_of("2.3 Research Methodology").map(|h| h.0), Some("research methodology"));
        assert_eq!(heading_of("Problem Statement: bad roads").map(|h| h.1), Some("bad roads".to_string()));
        assert!(heading_of("The objectives are many").is_none());
    }

    #[test]
    fn test_empty_text_yields_empty_metadata() {
        assert!(extract_local("", 150).is_empty());
    }
}
