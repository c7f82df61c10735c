//! Runtime configuration, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::classify::ClassifierConfig;
use crate::error::ConfigError;

// ── IMAP source ─────────────────────────────────────────────────────

/// IMAP source configuration.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub folder: String,
    pub poll_interval_secs: u64,
}

impl ImapConfig {
    /// Build config from environment variables.
    /// Returns `None` if `TRIAGE_IMAP_HOST` is not set (source disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("TRIAGE_IMAP_HOST").ok()?;

        let port: u16 = std::env::var("TRIAGE_IMAP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let username = std::env::var("TRIAGE_IMAP_USERNAME").unwrap_or_default();
        let password = std::env::var("TRIAGE_IMAP_PASSWORD").unwrap_or_default();
        let folder = std::env::var("TRIAGE_IMAP_FOLDER").unwrap_or_else(|_| "INBOX".to_string());

        let poll_interval_secs: u64 = std::env::var("TRIAGE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Some(Self {
            host,
            port,
            username,
            password,
            folder,
            poll_interval_secs,
        })
    }
}

// ── Classifier ──────────────────────────────────────────────────────

impl ClassifierConfig {
    /// Build config from environment variables.
    /// `TRIAGE_CLASSIFIER_API_KEY` is required; everything else defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("TRIAGE_CLASSIFIER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("TRIAGE_CLASSIFIER_API_KEY".to_string()))?;

        let endpoint = std::env::var("TRIAGE_CLASSIFIER_ENDPOINT")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());

        let model =
            std::env::var("TRIAGE_CLASSIFIER_MODEL").unwrap_or_else(|_| "gpt-4".to_string());

        let timeout_secs: u64 = std::env::var("TRIAGE_CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let max_inflight: usize = std::env::var("TRIAGE_CLASSIFIER_MAX_INFLIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(4);

        Ok(Self {
            endpoint,
            api_key: SecretString::from(api_key),
            model,
            timeout: Duration::from_secs(timeout_secs),
            max_inflight,
        })
    }
}

// ── Run mode ────────────────────────────────────────────────────────

/// Whether the binary processes one fetch batch and exits, or keeps
/// polling on an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Poll,
}

impl RunMode {
    pub fn from_env() -> Self {
        match std::env::var("TRIAGE_RUN_ONCE").ok().as_deref() {
            Some("1") | Some("true") => Self::Once,
            _ => Self::Poll,
        }
    }
}

/// Optional taxonomy config file path.
pub fn taxonomy_path_from_env() -> Option<PathBuf> {
    std::env::var("TRIAGE_TAXONOMY_PATH").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imap_config_none_without_host() {
        // SAFETY: test runs in isolation; no other thread reads this var concurrently.
        unsafe { std::env::remove_var("TRIAGE_IMAP_HOST") };
        assert!(ImapConfig::from_env().is_none());
    }

    #[test]
    fn run_mode_defaults_to_poll() {
        // SAFETY: as above.
        unsafe { std::env::remove_var("TRIAGE_RUN_ONCE") };
        assert_eq!(RunMode::from_env(), RunMode::Poll);
    }
}
