//! Built-in document text extraction.
//!
//! The extraction engine proper is an external collaborator; this module
//! ships a thin default: plain-text attachments are read directly, PDF
//! attachments go through the `pdftotext` executable when one is
//! installed. Anything else is unsupported and the normalizer moves on.

use std::path::Path;
use std::process::Command;

use crate::error::ExtractError;
use crate::message::DocumentTextExtractor;

/// Default `DocumentTextExtractor`: text/* read as UTF-8, application/pdf
/// delegated to `pdftotext`.
pub struct TextExtractor {
    pdftotext_bin: String,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self {
            pdftotext_bin: std::env::var("TRIAGE_PDFTOTEXT_BIN")
                .unwrap_or_else(|_| "pdftotext".to_string()),
        }
    }

    pub fn with_pdftotext_bin(bin: impl Into<String>) -> Self {
        Self {
            pdftotext_bin: bin.into(),
        }
    }

    fn extract_pdf(&self, path: &Path) -> Result<String, ExtractError> {
        let output = Command::new(&self.pdftotext_bin)
            .arg(path)
            .arg("-") // write extracted text to stdout
            .output()
            .map_err(|e| ExtractError::ExtractionFailed {
                reason: format!("failed to run {}: {e}", self.pdftotext_bin),
            })?;

        if !output.status.success() {
            return Err(ExtractError::ExtractionFailed {
                reason: format!(
                    "{} exited with {}: {}",
                    self.pdftotext_bin,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTextExtractor for TextExtractor {
    fn supports(&self, media_type: &str) -> bool {
        media_type == "application/pdf" || media_type.starts_with("text/")
    }

    fn extract_text(&self, path: &Path, media_type: &str) -> Result<String, ExtractError> {
        if media_type.starts_with("text/") {
            return std::fs::read_to_string(path).map_err(|e| ExtractError::ExtractionFailed {
                reason: format!("failed to read text attachment: {e}"),
            });
        }
        if media_type == "application/pdf" {
            return self.extract_pdf(path);
        }
        Err(ExtractError::UnsupportedFormat {
            media_type: media_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn supports_pdf_and_text() {
        let extractor = TextExtractor::new();
        assert!(extractor.supports("application/pdf"));
        assert!(extractor.supports("text/plain"));
        assert!(extractor.supports("text/csv"));
        assert!(!extractor.supports("image/png"));
    }

    #[test]
    fn reads_plain_text_attachment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Increase commitment by $5M").unwrap();

        let extractor = TextExtractor::new();
        let text = extractor.extract_text(file.path(), "text/plain").unwrap();
        assert_eq!(text, "Increase commitment by $5M");
    }

    #[test]
    fn unsupported_media_type_is_unsupported_format() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let extractor = TextExtractor::new();
        let err = extractor.extract_text(file.path(), "image/png").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_pdftotext_binary_is_extraction_failed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let extractor = TextExtractor::with_pdftotext_bin("definitely-not-a-real-binary");
        let err = extractor
            .extract_text(file.path(), "application/pdf")
            .unwrap_err();
        assert!(matches!(err, ExtractError::ExtractionFailed { .. }));
    }
}
