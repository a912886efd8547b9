//! Local filesystem storage implementation.
//!
//! Keys are paths relative to the output root, e.g. `feed/kinobox_trendy_rss.xml`.
//! Every write goes to its own uniquely named temp file next to the target,
//! which is then renamed over it. Readers never observe a partially written
//! feed, and concurrent writers never share a temp file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::ChangePolicy;
use crate::storage::{FeedStorage, WriteOutcome, content_digest};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        // Removed on drop unless persisted.
        let tmp = temp_file_for(&path)?;
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tmp.persist(&path).map_err(|e| AppError::Io(e.error))?;
        Ok(path)
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Fresh `.<name>.XXXXXX.tmp` in the target's directory.
fn temp_file_for(path: &Path) -> Result<TempPath> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!(".{name}.");

    let mut builder = tempfile::Builder::new();
    builder.prefix(&prefix).suffix(".tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    Ok(builder.tempfile_in(dir)?.into_temp_path())
}

#[async_trait]
impl FeedStorage for LocalStorage {
    async fn write_if_changed(
        &self,
        key: &str,
        content: &str,
        policy: &ChangePolicy,
    ) -> Result<WriteOutcome> {
        let digest = content_digest(content, policy);

        if let Some(existing) = self.read(key).await? {
            if content_digest(&existing, policy) == digest {
                log::info!("{} unchanged ({})", key, &digest[..12]);
                return Ok(WriteOutcome::Unchanged {
                    path: self.path(key),
                    digest,
                });
            }
        }

        let path = self.write_bytes(key, content.as_bytes()).await?;
        log::info!("Wrote {} ({} bytes, {})", path.display(), content.len(), &digest[..12]);
        Ok(WriteOutcome::Written { path, digest })
    }

    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_bytes(key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FEED: &str = "<rss>\n  <lastBuildDate>Mon, 01 Jul 2024 12:30:00 +0200</lastBuildDate>\n  <title>A</title>\n</rss>\n";
    const FEED_LATER: &str = "<rss>\n  <lastBuildDate>Tue, 02 Jul 2024 08:00:00 +0200</lastBuildDate>\n  <title>A</title>\n</rss>\n";
    const FEED_CHANGED: &str = "<rss>\n  <lastBuildDate>Tue, 02 Jul 2024 08:00:00 +0200</lastBuildDate>\n  <title>B</title>\n</rss>\n";

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let policy = ChangePolicy::default();

        for _ in 0..20 {
            let (a, b) = tokio::join!(
                storage.write_if_changed("feed/a.xml", FEED, &policy),
                storage.write_if_changed("feed/a.xml", FEED_CHANGED, &policy),
            );
            a.unwrap();
            b.unwrap();

            let stored = storage.read("feed/a.xml").await.unwrap().unwrap();
            assert!(stored == FEED || stored == FEED_CHANGED);
        }

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("feed"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("a.xml")]);
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read("nope.xml").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_written_then_unchanged() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let policy = ChangePolicy::default();

        let first = storage
            .write_if_changed("feed/a.xml", FEED, &policy)
            .await
            .unwrap();
        assert!(first.is_written());
        assert_eq!(first.path(), &tmp.path().join("feed/a.xml"));

        let modified = std::fs::metadata(first.path()).unwrap().modified().unwrap();

        let second = storage
            .write_if_changed("feed/a.xml", FEED, &policy)
            .await
            .unwrap();
        assert!(!second.is_written());
        assert_eq!(first.digest(), second.digest());
        assert_eq!(
            std::fs::metadata(second.path()).unwrap().modified().unwrap(),
            modified
        );
    }

    #[tokio::test]
    async fn test_build_date_only_change_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let policy = ChangePolicy::default();

        storage.write_if_changed("a.xml", FEED, &policy).await.unwrap();
        let outcome = storage
            .write_if_changed("a.xml", FEED_LATER, &policy)
            .await
            .unwrap();

        assert!(!outcome.is_written());
        assert_eq!(storage.read("a.xml").await.unwrap().as_deref(), Some(FEED));
    }

    #[tokio::test]
    async fn test_content_change_is_written() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let policy = ChangePolicy::default();

        storage.write_if_changed("a.xml", FEED, &policy).await.unwrap();
        let outcome = storage
            .write_if_changed("a.xml", FEED_CHANGED, &policy)
            .await
            .unwrap();

        assert!(outcome.is_written());
        assert_eq!(
            storage.read("a.xml").await.unwrap().as_deref(),
            Some(FEED_CHANGED)
        );
    }

    #[tokio::test]
    async fn test_strict_policy_rewrites_on_timestamp() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let policy = ChangePolicy::strict();

        storage.write_if_changed("a.xml", FEED, &policy).await.unwrap();
        let outcome = storage
            .write_if_changed("a.xml", FEED_LATER, &policy)
            .await
            .unwrap();
        assert!(outcome.is_written());
    }
}
