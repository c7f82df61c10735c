//! Inbound message model and external collaborator interfaces.
//!
//! `RawMessage` is the unified inbound shape produced by a `MessageSource`.
//! The pipeline reads it, never mutates it; its lifetime ends after
//! normalization.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, SourceError};

// ── Inbound message ─────────────────────────────────────────────────

/// A binary attachment carried by an inbound message.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Original filename, if the message carried one.
    pub filename: String,
    /// MIME media type, e.g. "application/pdf".
    pub media_type: String,
    /// Raw attachment bytes.
    pub content: Vec<u8>,
}

/// Unified inbound message from a mailbox source.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Source-native message id (Message-ID header or generated UUID).
    pub id: String,
    /// Sender address.
    pub sender: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body, if the message has one.
    pub body: Option<String>,
    /// Attachments in original message order.
    pub attachments: Vec<Attachment>,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    /// Construct a bodyless message skeleton (handy in tests and adapters).
    pub fn new(id: impl Into<String>, sender: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: None,
            attachments: Vec::new(),
            received_at: Utc::now(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

// ── Terminal output record ──────────────────────────────────────────

/// The pipeline's terminal output: one record per successfully processed
/// unique message. Field names serialize in the service-request record
/// format consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedRequest {
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Sender")]
    pub sender: String,
    #[serde(rename = "Request Type")]
    pub request_type: String,
    #[serde(rename = "Sub Request Type")]
    pub sub_request_type: String,
    #[serde(rename = "Attributes")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "Assigned Team")]
    pub assigned_team: String,
}

// ── Collaborator traits ─────────────────────────────────────────────

/// Mailbox transport — lists messages not yet seen by this or a prior run.
///
/// The source owns the notion of "unseen"; the pipeline does not re-derive
/// it (content-level dedup is a separate, in-process concern).
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Source name for logging (e.g. "imap").
    fn name(&self) -> &str;

    /// Fetch messages not yet processed.
    async fn list_unprocessed(&self) -> Result<Vec<RawMessage>, SourceError>;
}

/// Text extraction engine for binary document formats.
///
/// The normalizer spills attachment bytes to a transient file and hands the
/// extractor a path; the extractor never owns the file.
pub trait DocumentTextExtractor: Send + Sync {
    /// Whether this extractor can handle the given media type.
    fn supports(&self, media_type: &str) -> bool;

    /// Extract text from the document at `path`.
    fn extract_text(&self, path: &Path, media_type: &str) -> Result<String, ExtractError>;
}
