// Copyright 2025 proposal_engine contributors
// SPDX-License-Identifier: MIT
//
//! OCR fallback for scanned PDFs: rasterize page 1 with `pdftoppm`, read it with `tesseract`.
//!
//! All intermediate files live in a `TempDir` that is removed when it goes out
//! of scope, whichever way the function returns.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};

/// Something that can turn the first page of a PDF into text.
pub trait OcrEngine: Send + Sync {
    fn ocr_first_page(&self, pdf_bytes: &[u8]) -> Result<String>;
}

/// CLI-based OCR using poppler's `pdftoppm` and `tesseract`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub pdftoppm_bin: String,
    pub tesseract_bin: String,
    pub dpi: u32,
    pub language: String,
    /// Parent directory for the scratch dir; system temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
    /// Budget for each external tool run; the process is killed when it runs over.
    pub timeout: Duration,
}

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

impl Default for TesseractOcr {
    fn default() -> Self {
        Self {
            pdftoppm_bin: std::env::var("PROPOSAL_ENGINE_PDFTOPPM").unwrap_or_else(|_| "pdftoppm".to_string()),
            tesseract_bin: std::env::var("PROPOSAL_ENGINE_TESSERACT").unwrap_or_else(|_| "tesseract".to_string()),
            dpi: 300,
            language: "eng".to_string(),
            scratch_root: None,
            timeout: std::env::var("PROPOSAL_ENGINE_OCR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TOOL_TIMEOUT),
        }
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_pipe(pipe: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    pipe.and_then(|handle| handle.join().ok()).unwrap_or_default()
}

/// Run `bin` to completion within `timeout`, returning its stdout.
fn run_tool(bin: &str, args: &[&str], timeout: Duration) -> Result<Vec<u8>> {
    let spawned = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match spawned {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => bail!("{} not found on PATH", bin),
        Err(e) => return Err(e).with_context(|| format!("failed to spawn {}", bin)),
        Ok(child) => child,
    };
    // pipes are drained concurrently so a chatty tool cannot block on a full buffer
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait().with_context(|| format!("failed to wait for {}", bin))? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            warn!("[ocr] Killed {} after {:?}", bin, timeout);
            bail!("{} timed out after {:?}", bin, timeout);
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = join_pipe(stdout);
    let stderr = join_pipe(stderr);
    if !status.success() {
        bail!("{} exited with {}: {}", bin, status, String::from_utf8_lossy(&stderr).trim());
    }
    Ok(stdout)
}

impl TesseractOcr {
    fn scratch_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("proposal-ocr-");
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.context("failed to create OCR scratch dir")
    }

    fn rasterize_first_page(&self, pdf_path: &Path, out_stem: &Path) -> Result<PathBuf> {
        let dpi = self.dpi.to_string();
        let pdf = pdf_path.to_string_lossy();
        let stem = out_stem.to_string_lossy();
        run_tool(
            &self.pdftoppm_bin,
            &["-f", "1", "-l", "1", "-r", &dpi, "-png", "-singlefile", &pdf, &stem],
            self.timeout,
        )?;
        let image = out_stem.with_extension("png");
        anyhow::ensure!(image.exists(), "rasterizer produced no image");
        Ok(image)
    }
}

impl OcrEngine for TesseractOcr {
    fn ocr_first_page(&self, pdf_bytes: &[u8]) -> Result<String> {
        let scratch = self.scratch_dir()?;
        let pdf_path = scratch.path().join("input.pdf");
        let mut file = std::fs::File::create(&pdf_path).context("failed to write OCR input")?;
        file.write_all(pdf_bytes).context("failed to write OCR input")?;
        drop(file);

        let image = self.rasterize_first_page(&pdf_path, &scratch.path().join("page"))?;
        debug!("[ocr] Rasterized page 1 to {}", image.display());

        let image_arg = image.to_string_lossy();
        let stdout = run_tool(&self.tesseract_bin, &[&image_arg, "stdout", "-l", &self.language], self.timeout)?;
        let text = String::from_utf8_lossy(&stdout).to_string();
        info!("[ocr] Recovered {} chars from page 1", text.chars().count());
        Ok(text)
    }
}
