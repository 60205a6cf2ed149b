//! Cache backend implementations.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl,
        }
    }
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    async fn exists(&self, key: &CacheKey) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory LRU cache bounded by entry count.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.lock();
        let expired = match entries.get(&key.hash) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(&key.hash);
        }
        Ok(None)
    }
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        self.lock()
            .put(key.hash.clone(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }
    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock().pop(&key.hash).is_some())
    }
    async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self
            .lock()
            .peek(&key.hash)
            .map(|e| !e.is_expired())
            .unwrap_or(false))
    }
    async fn clear(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(self.lock().iter().filter(|(_, e)| !e.is_expired()).count())
    }
    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct NullCache;
impl NullCache {
    pub fn new() -> Self {
        Self
    }
}
impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn exists(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set(&"a".into(), b"1", ttl).await.unwrap();
        cache.set(&"b".into(), b"2", ttl).await.unwrap();
        // touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get(&"a".into()).await.unwrap(), Some(b"1".to_vec()));
        cache.set(&"c".into(), b"3", ttl).await.unwrap();

        assert!(cache.exists(&"a".into()).await.unwrap());
        assert!(!cache.exists(&"b".into()).await.unwrap());
        assert!(cache.exists(&"c".into()).await.unwrap());
        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn memory_cache_drops_expired_entries() {
        let cache = MemoryCache::new(4);
        cache
            .set(&"k".into(), b"v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&"k".into()).await.unwrap(), None);
        assert_eq!(cache.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn null_cache_never_stores() {
        let cache = NullCache::new();
        cache.set(&"k".into(), b"v", Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.get(&"k".into()).await.unwrap(), None);
        assert!(!cache.delete(&"k".into()).await.unwrap());
    }
}
