//! IMAP message source — raw IMAP over rustls TLS.
//!
//! Searches the configured folder for unseen messages, fetches each as
//! RFC822, parses body and attachments with `mail-parser`, and marks the
//! message `\Seen` so it is not listed again by a later run. The blocking
//! protocol exchange runs under `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::{MessageParser, MimeHeaders};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ImapConfig;
use crate::error::SourceError;
use crate::message::{Attachment, MessageSource, RawMessage};

/// IMAP-backed `MessageSource`.
pub struct ImapSource {
    config: ImapConfig,
}

impl ImapSource {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MessageSource for ImapSource {
    fn name(&self) -> &str {
        "imap"
    }

    async fn list_unprocessed(&self) -> Result<Vec<RawMessage>, SourceError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_unseen(&config))
            .await
            .map_err(|e| SourceError::Protocol(format!("fetch task panicked: {e}")))?
    }
}

// ── Blocking IMAP session ───────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

struct ImapSession {
    stream: TlsStream,
    tag_counter: u32,
}

impl ImapSession {
    /// Connect TCP + TLS and consume the server greeting.
    fn connect(config: &ImapConfig) -> Result<Self, SourceError> {
        let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|e| {
            SourceError::ConnectFailed {
                name: "imap".to_string(),
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(config.host.clone())
            .map_err(|e| SourceError::ConnectFailed {
                name: "imap".to_string(),
                reason: format!("invalid server name: {e}"),
            })?;
        let conn = rustls::ClientConnection::new(tls_config, server_name).map_err(|e| {
            SourceError::ConnectFailed {
                name: "imap".to_string(),
                reason: format!("TLS setup failed: {e}"),
            }
        })?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag_counter: 0,
        };
        session.read_line()?;
        Ok(session)
    }

    fn read_line(&mut self) -> Result<String, SourceError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(SourceError::Protocol("connection closed".to_string())),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(SourceError::Io(e)),
            }
        }
    }

    /// Send a tagged command and collect response lines up to the tagged
    /// completion line.
    fn send_command(&mut self, command: &str) -> Result<Vec<String>, SourceError> {
        self.tag_counter += 1;
        let tag = format!("T{}", self.tag_counter);
        let full = format!("{tag} {command}\r\n");
        self.stream.write_all(full.as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), SourceError> {
        let response = self.send_command(&format!("LOGIN \"{username}\" \"{password}\""))?;
        if response.last().is_some_and(|l| l.contains("OK")) {
            Ok(())
        } else {
            Err(SourceError::AuthFailed {
                name: "imap".to_string(),
            })
        }
    }

    fn select(&mut self, folder: &str) -> Result<(), SourceError> {
        let response = self.send_command(&format!("SELECT \"{folder}\""))?;
        if response.last().is_some_and(|l| l.contains("OK")) {
            Ok(())
        } else {
            Err(SourceError::Protocol(format!("SELECT {folder} failed")))
        }
    }

    fn search_unseen(&mut self) -> Result<Vec<String>, SourceError> {
        let response = self.send_command("SEARCH UNSEEN")?;
        Ok(collect_search_uids(&response))
    }

    fn fetch_rfc822(&mut self, uid: &str) -> Result<String, SourceError> {
        let response = self.send_command(&format!("FETCH {uid} RFC822"))?;
        // Drop the untagged FETCH header line and the tagged completion line.
        Ok(response
            .iter()
            .skip(1)
            .take(response.len().saturating_sub(2))
            .cloned()
            .collect())
    }

    fn mark_seen(&mut self, uid: &str) {
        if let Err(e) = self.send_command(&format!("STORE {uid} +FLAGS (\\Seen)")) {
            warn!(uid = %uid, error = %e, "Failed to mark message seen");
        }
    }

    fn logout(mut self) {
        let _ = self.send_command("LOGOUT");
    }
}

/// Run one full fetch cycle: login, search unseen, fetch + parse each,
/// mark seen, logout.
fn fetch_unseen(config: &ImapConfig) -> Result<Vec<RawMessage>, SourceError> {
    let mut session = ImapSession::connect(config)?;
    session.login(&config.username, &config.password)?;
    session.select(&config.folder)?;

    let uids = session.search_unseen()?;
    debug!(count = uids.len(), "Unseen messages found");

    let mut messages = Vec::with_capacity(uids.len());
    for uid in &uids {
        let raw = session.fetch_rfc822(uid)?;
        match parse_rfc822(raw.as_bytes()) {
            Some(message) => messages.push(message),
            None => warn!(uid = %uid, "Failed to parse fetched message, skipping"),
        }
        session.mark_seen(uid);
    }

    session.logout();
    Ok(messages)
}

// ── Parsing helpers ─────────────────────────────────────────────────

/// Pull UIDs out of `* SEARCH ...` response lines.
pub(crate) fn collect_search_uids(lines: &[String]) -> Vec<String> {
    let mut uids = Vec::new();
    for line in lines {
        if line.starts_with("* SEARCH") {
            uids.extend(
                line.split_whitespace()
                    .skip(2)
                    .map(|s| s.trim().to_string()),
            );
        }
    }
    uids
}

/// Parse an RFC822 message into the pipeline's inbound shape.
pub(crate) fn parse_rfc822(raw: &[u8]) -> Option<RawMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let subject = parsed.subject().unwrap_or("(no subject)").to_string();

    let id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let body = extract_body(&parsed);

    let attachments: Vec<Attachment> = parsed
        .attachments()
        .map(|part| Attachment {
            filename: part.attachment_name().unwrap_or("attachment").to_string(),
            media_type: media_type_of(part),
            content: part.contents().to_vec(),
        })
        .collect();

    let received_at = parsed
        .date()
        .and_then(|d| {
            chrono::NaiveDate::from_ymd_opt(d.year as i32, u32::from(d.month), u32::from(d.day))
                .and_then(|date| {
                    date.and_hms_opt(
                        u32::from(d.hour),
                        u32::from(d.minute),
                        u32::from(d.second),
                    )
                })
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(chrono::Utc::now);

    Some(RawMessage {
        id,
        sender,
        subject,
        body,
        attachments,
        received_at,
    })
}

/// Readable body text: the text part if present, else stripped HTML.
/// `None` when the message has no usable body (attachment-only messages).
fn extract_body(parsed: &mail_parser::Message) -> Option<String> {
    if let Some(text) = parsed.body_text(0)
        && !text.trim().is_empty()
    {
        return Some(text.to_string());
    }
    if let Some(html) = parsed.body_html(0) {
        let stripped = strip_html(html.as_ref());
        if !stripped.trim().is_empty() {
            return Some(stripped);
        }
    }
    None
}

/// Full media type string for a MIME part, e.g. "application/pdf".
fn media_type_of(part: &mail_parser::MessagePart) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        },
        None => "application/octet-stream".to_string(),
    }
}

/// Strip HTML tags and normalize whitespace (basic).
pub(crate) fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
