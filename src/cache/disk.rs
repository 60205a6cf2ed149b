//! Size-bounded on-disk cache backend.
//!
//! One file per key: an 8-byte big-endian expiry (unix seconds) followed by
//! the cached body. When the directory grows past `max_size_bytes` the
//! least recently written entries are removed first.

use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const ENTRY_EXT: &str = "entry";
const HEADER_LEN: usize = 8;

pub struct DiskCache {
    dir: PathBuf,
    max_size_bytes: u64,
}

impl DiskCache {
    /// Create the cache directory if needed.
    pub fn new(dir: impl Into<PathBuf>, max_size_bytes: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_size_bytes,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key.hash, ENTRY_EXT))
    }

    async fn read_entry(path: &Path) -> Result<Option<(u64, Vec<u8>)>> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.len() < HEADER_LEN {
            let _ = tokio::fs::remove_file(path).await;
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&raw[..HEADER_LEN]);
        Ok(Some((u64::from_be_bytes(header), raw[HEADER_LEN..].to_vec())))
    }

    async fn entries(&self) -> Result<Vec<(PathBuf, u64, SystemTime)>> {
        let mut out = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let meta = item.metadata().await?;
            let modified = meta.modified().unwrap_or(UNIX_EPOCH);
            out.push((path, meta.len(), modified));
        }
        Ok(out)
    }

    async fn enforce_size(&self) -> Result<()> {
        let mut entries = self.entries().await?;
        let mut total: u64 = entries.iter().map(|(_, len, _)| *len).sum();
        if total <= self.max_size_bytes {
            return Ok(());
        }
        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in entries {
            if total <= self.max_size_bytes {
                break;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    total = total.saturating_sub(len);
                    debug!(path = %path.display(), "evicted cache entry");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cache eviction failed"),
            }
        }
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl CacheBackend for DiskCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match Self::read_entry(&path).await? {
            Some((expires_at, data)) if expires_at > now_secs() => Ok(Some(data)),
            Some(_) => {
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        if value.len() as u64 + HEADER_LEN as u64 > self.max_size_bytes {
            return Ok(());
        }
        let expires_at = now_secs().saturating_add(ttl.as_secs().max(1));
        let mut raw = Vec::with_capacity(HEADER_LEN + value.len());
        raw.extend_from_slice(&expires_at.to_be_bytes());
        raw.extend_from_slice(value);

        let path = self.entry_path(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        self.enforce_size().await
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(Self::read_entry(&self.entry_path(key))
            .await?
            .map(|(expires_at, _)| expires_at > now_secs())
            .unwrap_or(false))
    }

    async fn clear(&self) -> Result<()> {
        for (path, _, _) in self.entries().await? {
            let _ = tokio::fs::remove_file(path).await;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let now = now_secs();
        let mut live = 0;
        for (path, _, _) in self.entries().await? {
            if let Some((expires_at, _)) = Self::read_entry(&path).await? {
                if expires_at > now {
                    live += 1;
                }
            }
        }
        Ok(live)
    }

    fn name(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 1024).unwrap();
        let key = CacheKey::new("abc");
        cache.set(&key, b"payload", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"payload".to_vec()));
        assert!(cache.exists(&key).await.unwrap());
        assert_eq!(cache.len().await.unwrap(), 1);
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn evicts_oldest_when_over_budget() {
        let dir = tempfile::tempdir().unwrap();
        // each entry is 8 + 40 bytes; two fit, three do not
        let cache = DiskCache::new(dir.path(), 100).unwrap();
        let body = [7u8; 40];
        cache.set(&"first".into(), &body, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set(&"second".into(), &body, Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set(&"third".into(), &body, Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
        assert!(cache.exists(&"third".into()).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_values_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 16).unwrap();
        cache.set(&"big".into(), &[0u8; 64], Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get(&"big".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 1024).unwrap();
        cache.set(&"a".into(), b"1", Duration::from_secs(60)).await.unwrap();
        cache.set(&"b".into(), b"2", Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 0);
    }
}
