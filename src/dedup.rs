//! Content-level deduplication.
//!
//! Fingerprints the canonical payload and tracks seen fingerprints in a
//! process-wide set: empty at startup, grows monotonically, never persisted.
//! Test-and-insert is atomic under the set lock, so concurrent duplicate
//! submissions yield exactly one `New`.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

// ── Fingerprint ─────────────────────────────────────────────────────

/// SHA-256 digest of a canonical payload, used as the deduplication key.
///
/// Byte-equal payloads always produce equal fingerprints. Collision
/// handling is out of scope at this digest width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    /// Fingerprint the given payload text.
    pub fn of(payload: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// ── Deduplicator ────────────────────────────────────────────────────

/// Outcome of a dedup check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStatus {
    /// First time this content is seen; the fingerprint is now marked.
    New,
    /// Content already processed in this run.
    Duplicate,
}

/// Process-wide duplicate tracker keyed by content fingerprint.
pub struct Deduplicator {
    seen: Mutex<HashSet<ContentFingerprint>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically test whether this payload has been processed and mark it.
    ///
    /// Exactly one caller gets `New` for a given payload; all later (or
    /// concurrently racing) callers get `Duplicate`.
    pub fn check_and_mark(&self, payload: &str) -> DedupStatus {
        let fingerprint = ContentFingerprint::of(payload);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(fingerprint) {
            DedupStatus::New
        } else {
            DedupStatus::Duplicate
        }
    }

    /// Number of distinct payloads marked so far.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn equal_payloads_equal_fingerprints() {
        assert_eq!(ContentFingerprint::of("hello"), ContentFingerprint::of("hello"));
        assert_ne!(ContentFingerprint::of("hello"), ContentFingerprint::of("hello "));
    }

    #[test]
    fn fingerprint_hex_display() {
        let hex = ContentFingerprint::of("x").to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn first_check_is_new_second_is_duplicate() {
        let dedup = Deduplicator::new();
        assert_eq!(dedup.check_and_mark("payload"), DedupStatus::New);
        assert_eq!(dedup.check_and_mark("payload"), DedupStatus::Duplicate);
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn distinct_payloads_are_both_new() {
        let dedup = Deduplicator::new();
        assert_eq!(dedup.check_and_mark("a"), DedupStatus::New);
        assert_eq!(dedup.check_and_mark("b"), DedupStatus::New);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn starts_empty() {
        assert!(Deduplicator::new().is_empty());
    }

    #[test]
    fn concurrent_duplicates_yield_exactly_one_new() {
        let dedup = Arc::new(Deduplicator::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let dedup = Arc::clone(&dedup);
            handles.push(std::thread::spawn(move || {
                dedup.check_and_mark("same payload")
            }));
        }
        let news = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|s| *s == DedupStatus::New)
            .count();
        assert_eq!(news, 1);
        assert_eq!(dedup.len(), 1);
    }
}
