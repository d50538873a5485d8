// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! Model-based metadata extraction.
//!
//! Never fails: any service, timeout or parse problem degrades to an empty
//! `ExtractedMetadata`, leaving the local extractor as the baseline.

use log::{debug, warn};
use serde_json::Value;

use crate::api::document_parser::truncate_chars;
use crate::api::metadata::{ExtractedMetadata, DEPARTMENTS};
use crate::api::provider::{GenerationRequest, TextGenerator};

/// Prompt asking for exactly the metadata fields as a JSON object.
pub fn build_metadata_prompt(excerpt: &str) -> String {
    format!(
        "You are extracting metadata from a final-year project proposal.\n\
         Return ONLY a JSON object with exactly these keys:\n\
         {{\n\
         \x20 \"title\": string or null,\n\
         \x20 \"supervisor\": string or null,\n\
         \x20 \"students\": array of student full names (without registration numbers), or [],\n\
         \x20 \"academicYear\": string like \"2023/2024\" or null,\n\
         \x20 \"department\": one of [{departments}] or null,\n\
         \x20 \"problemStatement\": string (at most 150 words) or null,\n\
         \x20 \"objectives\": array of strings, one per objective, or []\n\
         }}\n\
         Use null or [] when a field is not present. Do not invent values. \
         If the department is not in the list, use \"Other\".\n\n\
         Document:\n\"\"\"\n{excerpt}\n\"\"\"",
        departments = DEPARTMENTS.iter().map(|d| format!("\"{}\"", d)).collect::<Vec<_>>().join(", "),
        excerpt = excerpt,
    )
}

/// Remove Markdown code fences around a model reply.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag line, e.g. ```json
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("null") => {
            Some(s.trim().to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(json_string).collect(),
        Value::String(s) => s
            .split(['\n', ';'])
            .map(|part| part.trim().trim_start_matches(['-', '•', '*']).trim())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Parse a reply into metadata; anything that is not a JSON object yields the empty value.
pub fn parse_metadata_reply(reply: &str) -> ExtractedMetadata {
    let body = strip_code_fences(reply);
    // the object span is only cut out of replies that are not JSON as a whole
    let parsed = serde_json::from_str::<Value>(body).or_else(|e| match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str::<Value>(&body[start..=end]),
        _ => Err(e),
    });

    let object = match parsed {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("[metadata_ai] Reply is JSON but not an object ({})", type_name(&other));
            return ExtractedMetadata::default();
        }
        Err(e) => {
            warn!("[metadata_ai] Reply is not valid JSON: {}", e);
            return ExtractedMetadata::default();
        }
    };

    let field = |keys: &[&str]| keys.iter().find_map(|k| object.get(*k)).cloned().unwrap_or(Value::Null);
    ExtractedMetadata {
        title: json_string(&field(&["title"])),
        supervisor: json_string(&field(&["supervisor"])),
        students: json_string_list(&field(&["students", "studentNames"])),
        academic_year: json_string(&field(&["academicYear", "academic_year", "year"])),
        department: json_string(&field(&["department"])).map(|d| close_department(&d)),
        problem_statement: json_string(&field(&["problemStatement", "problem_statement"])),
        objectives: json_string_list(&field(&["objectives"])),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Force a model-supplied department into the closed vocabulary.
fn close_department(raw: &str) -> String {
    DEPARTMENTS
        .iter()
        .find(|d| d.eq_ignore_ascii_case(raw.trim()))
        .unwrap_or(&"Other")
        .to_string()
}

/// Ask the model for metadata over a bounded excerpt of `text`.
pub fn extract_with_model(text: &str, generator: &dyn TextGenerator, max_chars: usize) -> ExtractedMetadata {
    let excerpt = truncate_chars(text, max_chars);
    if excerpt.trim().is_empty() {
        return ExtractedMetadata::default();
    }
    let prompt = build_metadata_prompt(excerpt);
    match generator.generate_text(&GenerationRequest::json(&prompt)) {
        Ok(reply) => {
            debug!("[metadata_ai] Reply: {} chars", reply.len());
            parse_metadata_reply(&reply)
        }
        Err(e) => {
            warn!("[metadata_ai] Model extraction unavailable, using local rules only: {:#}", e);
            ExtractedMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl TextGenerator for Recording {
        fn generate_text(&self, request: &GenerationRequest) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            match &self.reply {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!("{}", e)),
            }
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = "```json\n{\"title\": \"E-Voting System\", \"students\": [\"Ada Obi\", \"\"], \"objectives\": [\"To design\"], \"department\": \"computer science\", \"supervisor\": null}\n```";
        let meta = parse_metadata_reply(reply);
        assert_eq!(meta.title.as_deref(), Some("E-Voting System"));
        assert_eq!(meta.students, vec!["Ada Obi"]);
        assert_eq!(meta.objectives, vec!["To design"]);
        assert_eq!(meta.department.as_deref(), Some("Computer Science"));
        assert!(meta.supervisor.is_none());
    }

    #[test]
    fn test_parse_with_surrounding_prose() {
        let meta = parse_metadata_reply("Here you go: {\"title\": \"X Y\", \"academicYear\": \"2022/2023\"} hope it helps");
        assert_eq!(meta.title.as_deref(), Some("X Y"));
        assert_eq!(meta.academic_year.as_deref(), Some("2022/2023"));
    }

    #[test]
    fn test_unknown_department_becomes_other() {
        let meta = parse_metadata_reply("{\"department\": \"Marine Biology\"}");
        assert_eq!(meta.department.as_deref(), Some("Other"));
    }

    #[test]
    fn test_invalid_or_non_object_reply_degrades_to_empty() {
        assert!(parse_metadata_reply("not json at all").is_empty());
        assert!(parse_metadata_reply("[1, 2, 3]").is_empty());
        assert!(parse_metadata_reply("{\"title\": ").is_empty());
        assert!(parse_metadata_reply("").is_empty());
    }

    #[test]
    fn test_array_of_objects_is_not_unwrapped() {
        assert!(parse_metadata_reply("[{\"title\":\"X\"}]").is_empty());
        assert!(parse_metadata_reply("```json\n[{\"title\": \"Blockchain Voting\"}]\n```").is_empty());
    }

    #[test]
    fn test_service_error_degrades_to_empty() {
        let generator = Recording { reply: Err(anyhow::anyhow!("503")), prompts: Mutex::new(vec![]) };
        assert!(extract_with_model("some proposal text", &generator, 100).is_empty());
    }

    #[test]
    fn test_excerpt_is_capped() {
        let generator = Recording { reply: Ok("{}".to_string()), prompts: Mutex::new(vec![]) };
        let text = "x".repeat(10_000);
        let _ = extract_with_model(&text, &generator, 500);
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&"x".repeat(500)));
        assert!(!prompts[0].contains(&"x".repeat(501)));
    }

    #[test]
    fn test_prompt_lists_closed_vocabulary() {
        let prompt = build_metadata_prompt("doc");
        assert!(prompt.contains("\"Other\""));
        assert!(prompt.contains("\"problemStatement\""));
    }
}
