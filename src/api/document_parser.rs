// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
// Document-to-Text (DTT) module: bounded text extraction from PDF and DOCX uploads

use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::config::ExtractionConfig;
use crate::api::error::EngineError;
use crate::api::ocr::{OcrEngine, TesseractOcr};

const MAX_FILE_SIZE: usize = 50 * 1024 * 1024; // 50MB

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

static HYPHEN_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)-\s*$").unwrap());
static WORD_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)").unwrap());
static INLINE_HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)-[ \t]*\r?\n[ \t]*([a-z]\w*)").unwrap());
static INLINE_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").unwrap());

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    WordProcessing,
}

impl DocumentKind {
    /// Resolve the format from the caller's MIME hint.
    ///
    /// Generic binary hints fall back to magic-byte sniffing.
    pub fn resolve(mime_hint: &str, file_bytes: &[u8]) -> Result<Self, EngineError> {
        let mime = mime_hint
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" | "pdf" => Ok(DocumentKind::Pdf),
            DOCX_MIME | "application/msword" | "docx" => Ok(DocumentKind::WordProcessing),
            "application/octet-stream" | "" => {
                if file_bytes.starts_with(b"%PDF") {
                    Ok(DocumentKind::Pdf)
                } else if file_bytes.starts_with(b"PK") {
                    Ok(DocumentKind::WordProcessing)
                } else {
                    Err(EngineError::UnsupportedFormat(format!("{} (unrecognized content)", mime_hint)))
                }
            }
            _ => Err(EngineError::UnsupportedFormat(mime_hint.to_string())),
        }
    }
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Remove page number from the end of a page text (if present)
/// Only removes if the last non-empty line is purely numeric
fn remove_trailing_page_number(page_text: &str) -> String {
    let lines: Vec<&str> = page_text.lines().collect();
    let Some(last_content_idx) = lines.iter().rposition(|l| !l.trim().is_empty()) else {
        return page_text.to_string();
    };

    let last_line = lines[last_content_idx].trim();
    if last_line.chars().all(|c| c.is_ascii_digit()) {
        let mut result: Vec<&str> = lines[..last_content_idx].to_vec();
        result.extend_from_slice(&lines[last_content_idx + 1..]);
        result.join("\n")
    } else {
        page_text.to_string()
    }
}

/// Collapse horizontal whitespace and runs of blank lines, keeping line structure.
///
/// Line breaks are kept because the metadata rules work line by line.
fn normalize_layout(text: &str) -> String {
    let dehyphenated = INLINE_HYPHEN_RE.replace_all(text, "$1$2");
    let spaced = INLINE_SPACE_RE.replace_all(&dehyphenated, " ");
    let lines: Vec<&str> = spaced.lines().map(str::trim).collect();
    BLANK_LINES_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Join pages, re-joining words hyphenated across a page boundary.
fn join_pages(pages: &[String]) -> String {
    let mut result = String::new();

    for (i, page) in pages.iter().map(|p| remove_trailing_page_number(p)).enumerate() {
        if i == 0 {
            result = page;
            continue;
        }

        let result_trimmed = result.trim_end().to_string();
        if let Some(caps) = HYPHEN_END_RE.captures(&result_trimmed) {
            let page_trimmed = page.trim_start();
            if let (Some(part1), Some(whole), Some(next_caps)) =
                (caps.get(1), caps.get(0), WORD_START_RE.captures(page_trimmed))
            {
                if let Some(part2) = next_caps.get(1) {
                    result.truncate(whole.start());
                    result.push_str(part1.as_str());
                    result.push_str(part2.as_str());
                    result.push_str(&page_trimmed[part2.end()..]);
                    continue;
                }
            }
        }

        result.push('\n');
        result.push_str(&page);
    }

    normalize_layout(&result)
}

/// Page numbers to render: the first `max_pages` of a `page_count`-page document.
fn page_range(page_count: usize, max_pages: usize) -> std::ops::RangeInclusive<u32> {
    let last = page_count.min(max_pages).min(u32::MAX as usize) as u32;
    1..=last
}

/// Render only the pages within budget; later pages are never decoded.
fn read_pdf_pages(file_bytes: &[u8], max_pages: usize) -> Result<Vec<String>, pdf_extract::OutputError> {
    let mut doc = pdf_extract::Document::load_mem(file_bytes)?;
    if doc.is_encrypted() {
        doc.decrypt("")?;
    }

    let page_count = doc.get_pages().len();
    let mut pages = Vec::new();
    for page_num in page_range(page_count, max_pages) {
        let mut text = String::new();
        {
            let mut output = pdf_extract::PlainTextOutput::new(&mut text);
            if let Err(e) = pdf_extract::output_doc_page(&doc, &mut output, page_num) {
                warn!("[dtt] Stopped at unreadable page {}: {:?}", page_num, e);
                break;
            }
        }
        pages.push(text);
    }
    debug!("[dtt] Rendered {} of {} PDF pages", pages.len(), page_count);
    Ok(pages)
}

fn pdf_pages(file_bytes: &[u8], max_pages: usize) -> Vec<String> {
    // pdf-extract panics on some malformed inputs
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| read_pdf_pages(file_bytes, max_pages)));
    match outcome {
        Ok(Ok(pages)) => pages,
        Ok(Err(e)) => {
            warn!("[dtt] PDF text layer unreadable: {:?}", e);
            Vec::new()
        }
        Err(_) => {
            warn!("[dtt] PDF parser panicked, treating as image-only document");
            Vec::new()
        }
    }
}

/// Bounded text extraction with OCR fallback for scanned PDFs.
pub struct DocumentTextExtractor {
    config: ExtractionConfig,
    ocr: Box<dyn OcrEngine>,
}

impl DocumentTextExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_ocr(config, Box::new(TesseractOcr::default()))
    }

    pub fn with_ocr(config: ExtractionConfig, ocr: Box<dyn OcrEngine>) -> Self {
        Self { config, ocr }
    }

    /// Extract at most `max_pages` worth of text from an uploaded document.
    pub fn extract_limited_text(
        &self,
        file_bytes: &[u8],
        mime_hint: &str,
        max_pages: usize,
    ) -> Result<String, EngineError> {
        let kind = DocumentKind::resolve(mime_hint, file_bytes)?;

        if file_bytes.len() > MAX_FILE_SIZE {
            return Err(EngineError::Extraction(format!(
                "file too large ({} bytes), maximum supported size is 50MB",
                file_bytes.len()
            )));
        }
        if file_bytes.len() < 4 {
            return Err(EngineError::Extraction("file too small to determine format".to_string()));
        }

        let max_pages = max_pages.max(1);
        let text = match kind {
            DocumentKind::WordProcessing => self.extract_word(file_bytes, max_pages)?,
            DocumentKind::Pdf => self.extract_pdf(file_bytes, max_pages)?,
        };
        info!("[dtt] Extracted {} chars ({:?}, max_pages={})", text.chars().count(), kind, max_pages);
        Ok(text)
    }

    fn extract_word(&self, file_bytes: &[u8], max_pages: usize) -> Result<String, EngineError> {
        let raw = docx_lite::extract_text_from_bytes(file_bytes)
            .map_err(|e| EngineError::Extraction(format!("DOCX extraction failed: {}", e)))?;
        let budget = self.config.approx_chars_per_page.saturating_mul(max_pages);
        let text = normalize_layout(truncate_chars(&raw, budget));
        if text.chars().count() < self.config.min_text_chars {
            return Err(EngineError::Extraction("insufficient text in document".to_string()));
        }
        Ok(text)
    }

    fn extract_pdf(&self, file_bytes: &[u8], max_pages: usize) -> Result<String, EngineError> {
        let pages = pdf_pages(file_bytes, max_pages);
        let text = join_pages(&pages);
        if text.chars().count() >= self.config.min_text_chars {
            return Ok(text);
        }

        debug!("[dtt] Text layer yielded {} chars, falling back to OCR", text.chars().count());
        let ocr_text = self
            .ocr
            .ocr_first_page(file_bytes)
            .map_err(|e| EngineError::Extraction(format!("insufficient text (OCR failed: {})", e)))?;
        let ocr_text = normalize_layout(&ocr_text);
        if ocr_text.chars().count() < self.config.min_text_chars {
            return Err(EngineError::Extraction("insufficient text after OCR".to_string()));
        }
        Ok(ocr_text)
    }
}
