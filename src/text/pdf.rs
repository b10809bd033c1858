//! PDF text extraction via the poppler `pdftotext` binary.
//!
//! Extraction is progressive: the first few pages are read, and only when a
//! trigger term shows up is the whole document extracted. A missing binary
//! or an unparseable PDF degrades to no text; the procedure can still be
//! created from its title.

use std::io::Write;
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::TextCache;

/// Terms that justify extracting the full document.
const TRIGGER_TERMS: &[&str] = &[
    "batteriespeicher",
    "energiespeicher",
    "bebauungsplan",
    "aufstellungsbeschluss",
];

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdftotext not found on PATH")]
    ToolNotFound,
    #[error("pdftotext failed: {0}")]
    ExtractionFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check whether `pdftotext` is available.
pub fn tool_available() -> bool {
    which::which("pdftotext").is_ok()
}

/// Extract text from PDF bytes, optionally limited to the first `max_pages`.
pub fn extract_text(pdf_bytes: &[u8], max_pages: Option<u32>) -> Result<String, PdfError> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(pdf_bytes)?;
    file.flush()?;

    let mut cmd = Command::new("pdftotext");
    cmd.args(["-enc", "UTF-8", "-f", "1"]);
    if let Some(last) = max_pages {
        cmd.args(["-l", &last.to_string()]);
    }
    cmd.arg(file.path()).arg("-");

    let output = match cmd.output() {
        Ok(out) => out,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PdfError::ToolNotFound);
        }
        Err(e) => return Err(PdfError::Io(e)),
    };

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(PdfError::ExtractionFailed(stderr.trim().to_string()))
    }
}

/// Result of a progressive extraction pass.
#[derive(Debug)]
pub struct ProgressiveText {
    pub text: String,
    /// Whether a trigger term was found (full document was extracted).
    pub has_triggers: bool,
}

/// Extract the first `initial_pages`, then the full document when a trigger
/// term is present. Consults and fills the text cache when one is given.
pub fn extract_progressive(
    pdf_bytes: &[u8],
    initial_pages: u32,
    url: &str,
    text_cache: Option<&TextCache>,
) -> Option<ProgressiveText> {
    if let Some(cache) = text_cache {
        if let Some(cached) = cache.get(url, pdf_bytes.len()) {
            debug!(url, "text cache hit");
            let has_triggers = contains_trigger(&cached);
            return Some(ProgressiveText {
                text: cached,
                has_triggers,
            });
        }
    }

    let initial = match extract_text(pdf_bytes, Some(initial_pages)) {
        Ok(text) => text,
        Err(PdfError::ToolNotFound) => {
            warn!("pdftotext not installed; skipping PDF text extraction");
            return None;
        }
        Err(e) => {
            warn!(url, error = %e, "failed to extract PDF text");
            return None;
        }
    };

    if initial.trim().is_empty() {
        return None;
    }

    let has_triggers = contains_trigger(&initial);
    let text = if has_triggers {
        match extract_text(pdf_bytes, None) {
            Ok(full) => full,
            Err(e) => {
                warn!(url, error = %e, "full extraction failed, keeping initial pages");
                initial
            }
        }
    } else {
        initial
    };

    if let Some(cache) = text_cache {
        cache.set(url, pdf_bytes.len(), &text);
    }

    Some(ProgressiveText { text, has_triggers })
}

fn contains_trigger(text: &str) -> bool {
    let normalized = crate::text::normalize(text);
    TRIGGER_TERMS.iter().any(|t| normalized.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_detection_is_normalized() {
        assert!(contains_trigger("Aufstellung eines BEBAUUNGSPLANES"));
        assert!(contains_trigger("Batteriespeicher am Umspannwerk"));
        assert!(!contains_trigger("Regenrückhaltebecken"));
    }

    #[test]
    fn garbage_bytes_do_not_panic() {
        // Either pdftotext is absent (ToolNotFound) or it rejects the input;
        // both surface as an error, never a panic.
        let result = extract_text(b"not a pdf", Some(1));
        if let Ok(text) = result {
            assert!(text.trim().is_empty());
        }
    }
}
