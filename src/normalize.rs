//! Content normalization — body text or attachment-extracted text, never both.
//!
//! Policy: a non-empty body wins verbatim and attachments are ignored
//! entirely. Otherwise attachments are scanned in original order and the
//! first supported one that extracts to non-empty text becomes the payload.
//! A message with no usable text anywhere is `EmptyContent`.

use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ExtractError, NormalizeError};
use crate::message::{Attachment, DocumentTextExtractor, RawMessage};

// ── Canonical payload ───────────────────────────────────────────────

/// The single normalized text representation of a message, used for both
/// fingerprinting and classification. Non-empty by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPayload(String);

impl CanonicalPayload {
    fn from_text(text: String) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// ── Normalizer ──────────────────────────────────────────────────────

/// Converts a raw message into a canonical text payload.
pub struct ContentNormalizer {
    extractor: Arc<dyn DocumentTextExtractor>,
}

impl ContentNormalizer {
    pub fn new(extractor: Arc<dyn DocumentTextExtractor>) -> Self {
        Self { extractor }
    }

    /// Normalize a message into its canonical payload.
    ///
    /// Attachments are only a fallback, not a supplement: once a body is
    /// present they are never read. Extractor failures on an attachment
    /// mean "no text here", not a message failure.
    pub fn normalize(&self, message: &RawMessage) -> Result<CanonicalPayload, NormalizeError> {
        if let Some(body) = &message.body
            && let Some(payload) = CanonicalPayload::from_text(body.clone())
        {
            return Ok(payload);
        }

        for attachment in &message.attachments {
            if !self.extractor.supports(&attachment.media_type) {
                debug!(
                    id = %message.id,
                    filename = %attachment.filename,
                    media_type = %attachment.media_type,
                    "Skipping unsupported attachment"
                );
                continue;
            }
            match self.spool_and_extract(attachment) {
                Ok(text) => {
                    if let Some(payload) = CanonicalPayload::from_text(text) {
                        return Ok(payload);
                    }
                    debug!(
                        id = %message.id,
                        filename = %attachment.filename,
                        "Attachment extracted to empty text"
                    );
                }
                Err(e) => {
                    debug!(
                        id = %message.id,
                        filename = %attachment.filename,
                        error = %e,
                        "Attachment extraction failed, trying next"
                    );
                }
            }
        }

        Err(NormalizeError::EmptyContent)
    }

    /// Spill attachment bytes to a scoped temp file and run the extractor.
    ///
    /// The temp file is removed when the handle drops, on every path
    /// including extractor failure.
    fn spool_and_extract(&self, attachment: &Attachment) -> Result<String, ExtractError> {
        let mut spool =
            tempfile::NamedTempFile::new().map_err(|e| ExtractError::ExtractionFailed {
                reason: format!("failed to create spool file: {e}"),
            })?;
        spool
            .write_all(&attachment.content)
            .and_then(|()| spool.flush())
            .map_err(|e| ExtractError::ExtractionFailed {
                reason: format!("failed to spool attachment bytes: {e}"),
            })?;

        self.extractor.extract_text(spool.path(), &attachment.media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    /// Extractor that reads the spooled file back as UTF-8 text.
    struct PassthroughExtractor {
        supported: &'static str,
    }

    impl DocumentTextExtractor for PassthroughExtractor {
        fn supports(&self, media_type: &str) -> bool {
            media_type == self.supported
        }

        fn extract_text(&self, path: &Path, _media_type: &str) -> Result<String, ExtractError> {
            std::fs::read_to_string(path).map_err(|e| ExtractError::ExtractionFailed {
                reason: e.to_string(),
            })
        }
    }

    /// Extractor that always fails, recording the paths it was handed.
    struct FailingExtractor {
        paths: Mutex<Vec<std::path::PathBuf>>,
    }

    impl DocumentTextExtractor for FailingExtractor {
        fn supports(&self, _media_type: &str) -> bool {
            true
        }

        fn extract_text(&self, path: &Path, _media_type: &str) -> Result<String, ExtractError> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            Err(ExtractError::ExtractionFailed {
                reason: "corrupt document".into(),
            })
        }
    }

    fn pdf_attachment(text: &str) -> Attachment {
        Attachment {
            filename: "doc.pdf".into(),
            media_type: "application/pdf".into(),
            content: text.as_bytes().to_vec(),
        }
    }

    fn normalizer() -> ContentNormalizer {
        ContentNormalizer::new(Arc::new(PassthroughExtractor {
            supported: "application/pdf",
        }))
    }

    #[test]
    fn body_wins_verbatim() {
        let msg = RawMessage::new("m-1", "a@b.com", "Subject")
            .with_body("Please process ongoing fee payment")
            .with_attachment(pdf_attachment("attachment text ignored"));
        let payload = normalizer().normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "Please process ongoing fee payment");
    }

    #[test]
    fn empty_body_falls_back_to_attachment() {
        let msg = RawMessage::new("m-2", "a@b.com", "Subject")
            .with_attachment(pdf_attachment("Increase commitment by $5M"));
        let payload = normalizer().normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "Increase commitment by $5M");
    }

    #[test]
    fn whitespace_body_treated_as_empty() {
        let msg = RawMessage::new("m-3", "a@b.com", "Subject")
            .with_body("   \n\t ")
            .with_attachment(pdf_attachment("fallback text"));
        let payload = normalizer().normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "fallback text");
    }

    #[test]
    fn unsupported_attachments_skipped() {
        let msg = RawMessage::new("m-4", "a@b.com", "Subject")
            .with_attachment(Attachment {
                filename: "pic.png".into(),
                media_type: "image/png".into(),
                content: vec![0xff],
            })
            .with_attachment(pdf_attachment("from the pdf"));
        let payload = normalizer().normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "from the pdf");
    }

    #[test]
    fn first_nonempty_extraction_wins() {
        let msg = RawMessage::new("m-5", "a@b.com", "Subject")
            .with_attachment(pdf_attachment(""))
            .with_attachment(pdf_attachment("second attachment"))
            .with_attachment(pdf_attachment("third attachment"));
        let payload = normalizer().normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "second attachment");
    }

    #[test]
    fn no_body_no_attachment_text_is_empty_content() {
        let msg = RawMessage::new("m-6", "a@b.com", "Subject").with_attachment(pdf_attachment(""));
        let err = normalizer().normalize(&msg).unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyContent));
    }

    #[test]
    fn no_body_no_attachments_is_empty_content() {
        let msg = RawMessage::new("m-7", "a@b.com", "Subject");
        let err = normalizer().normalize(&msg).unwrap_err();
        assert!(matches!(err, NormalizeError::EmptyContent));
    }

    #[test]
    fn extraction_failure_moves_to_next_attachment() {
        struct FirstFails;
        impl DocumentTextExtractor for FirstFails {
            fn supports(&self, _media_type: &str) -> bool {
                true
            }
            fn extract_text(&self, path: &Path, _media_type: &str) -> Result<String, ExtractError> {
                let bytes = std::fs::read(path).unwrap();
                if bytes == b"bad" {
                    Err(ExtractError::ExtractionFailed {
                        reason: "corrupt".into(),
                    })
                } else {
                    Ok(String::from_utf8_lossy(&bytes).into_owned())
                }
            }
        }

        let msg = RawMessage::new("m-8", "a@b.com", "Subject")
            .with_attachment(pdf_attachment("bad"))
            .with_attachment(pdf_attachment("good text"));
        let normalizer = ContentNormalizer::new(Arc::new(FirstFails));
        let payload = normalizer.normalize(&msg).unwrap();
        assert_eq!(payload.as_str(), "good text");
    }

    #[test]
    fn spool_file_released_after_extractor_failure() {
        let extractor = Arc::new(FailingExtractor {
            paths: Mutex::new(Vec::new()),
        });
        let msg = RawMessage::new("m-9", "a@b.com", "Subject")
            .with_attachment(pdf_attachment("anything"));
        let normalizer = ContentNormalizer::new(Arc::clone(&extractor) as Arc<dyn DocumentTextExtractor>);

        assert!(normalizer.normalize(&msg).is_err());
        let paths = extractor.paths.lock().unwrap();
        assert_eq!(paths.len(), 1);
        // Temp file must be gone once normalize returns.
        assert!(!paths[0].exists());
    }

    #[test]
    fn canonical_payload_rejects_empty() {
        assert!(CanonicalPayload::from_text(String::new()).is_none());
        assert!(CanonicalPayload::from_text("  ".into()).is_none());
        assert!(CanonicalPayload::from_text("x".into()).is_some());
    }
}
