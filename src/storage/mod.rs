//! Storage abstractions for rendered feeds.
//!
//! A feed file is only rewritten when its content changed. Content is
//! compared by the SHA-256 digest of its *fingerprint*: the text with the
//! elements named by the [`ChangePolicy`] removed, so a feed whose only
//! difference is its build timestamp counts as unchanged.

pub mod local;

use std::path::PathBuf;

use async_trait::async_trait;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::ChangePolicy;

// Re-export for convenience
pub use local::LocalStorage;

/// Result of a change-gated write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// New content was written to `path`
    Written { path: PathBuf, digest: String },
    /// Existing file already had equivalent content; nothing was touched
    Unchanged { path: PathBuf, digest: String },
}

impl WriteOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            WriteOutcome::Written { path, .. } | WriteOutcome::Unchanged { path, .. } => path,
        }
    }

    pub fn digest(&self) -> &str {
        match self {
            WriteOutcome::Written { digest, .. } | WriteOutcome::Unchanged { digest, .. } => digest,
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }
}

/// Trait for feed storage backends.
#[async_trait]
pub trait FeedStorage: Send + Sync {
    /// Write `content` under `key` unless the stored file is equivalent.
    async fn write_if_changed(
        &self,
        key: &str,
        content: &str,
        policy: &ChangePolicy,
    ) -> Result<WriteOutcome>;

    /// Read a stored feed, `None` if it does not exist.
    async fn read(&self, key: &str) -> Result<Option<String>>;
}

/// Content with ignored elements removed.
///
/// Only single-line occurrences (`<name>…</name>` on one line) are removed.
pub fn fingerprint(content: &str, policy: &ChangePolicy) -> String {
    let mut text = content.to_string();
    for name in &policy.ignore_elements {
        let name = regex::escape(name);
        let pattern = format!(r"<{name}(?:\s[^>]*)?>[^\n]*?</{name}>");
        match Regex::new(&pattern) {
            Ok(re) => text = re.replace_all(&text, "").into_owned(),
            Err(e) => log::warn!("Ignoring element '{}' in change policy: {}", name, e),
        }
    }
    text
}

/// SHA-256 hex digest of the content's fingerprint.
pub fn content_digest(content: &str, policy: &ChangePolicy) -> String {
    hex::encode(Sha256::digest(fingerprint(content, policy).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_A: &str = "<channel>\n  <lastBuildDate>Mon, 01 Jul 2024 12:30:00 +0200</lastBuildDate>\n  <title>A</title>\n</channel>\n";
    const FEED_B: &str = "<channel>\n  <lastBuildDate>Tue, 02 Jul 2024 08:00:00 +0200</lastBuildDate>\n  <title>A</title>\n</channel>\n";

    #[test]
    fn test_fingerprint_removes_ignored_elements() {
        let policy = ChangePolicy::default();
        let fp = fingerprint(FEED_A, &policy);
        assert!(!fp.contains("lastBuildDate"));
        assert!(fp.contains("<title>A</title>"));
    }

    #[test]
    fn test_digest_ignores_build_date() {
        let policy = ChangePolicy::default();
        assert_eq!(content_digest(FEED_A, &policy), content_digest(FEED_B, &policy));
    }

    #[test]
    fn test_strict_policy_compares_raw_bytes() {
        let policy = ChangePolicy::strict();
        assert_ne!(content_digest(FEED_A, &policy), content_digest(FEED_B, &policy));
        assert_eq!(fingerprint(FEED_A, &policy), FEED_A);
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let digest = content_digest("", &ChangePolicy::strict());
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
