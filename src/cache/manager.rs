//! Cache manager.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::Result;

/// How a GET call combines the network and the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Network only; the cache is neither read nor written.
    OnlyRemote,
    /// Network first; store successes, serve the cached copy when the remote is unavailable.
    #[default]
    FirstRemote,
    /// Cached copy if fresh, otherwise network (and store).
    FirstCache,
    /// Cached copy or fail; never touches the network.
    OnlyCache,
}

impl CacheMode {
    pub fn reads_cache(&self) -> bool { !matches!(self, Self::OnlyRemote) }
    pub fn writes_cache(&self) -> bool { matches!(self, Self::FirstRemote | Self::FirstCache) }
}

#[derive(Debug, Clone)]
pub struct CacheConfig { pub default_ttl: Duration, pub enabled: bool, pub max_entry_size: usize, pub key_prefix: Option<String> }

impl Default for CacheConfig {
    fn default() -> Self { Self { default_ttl: crate::config::DEFAULT_CACHE_MAX_AGE, enabled: true, max_entry_size: 10 * 1024 * 1024, key_prefix: None } }
}

impl CacheConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_ttl(mut self, ttl: Duration) -> Self { self.default_ttl = ttl; self }
    pub fn with_enabled(mut self, enabled: bool) -> Self { self.enabled = enabled; self }
    pub fn with_max_entry_size(mut self, size: usize) -> Self { self.max_entry_size = size; self }
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self { self.key_prefix = Some(prefix.into()); self }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats { pub hits: u64, pub misses: u64, pub sets: u64, pub deletes: u64, pub errors: u64 }

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 { let total = self.hits + self.misses; if total == 0 { 0.0 } else { self.hits as f64 / total as f64 } }
}

struct AtomicStats { hits: AtomicU64, misses: AtomicU64, sets: AtomicU64, deletes: AtomicU64, errors: AtomicU64 }
impl AtomicStats {
    fn new() -> Self { Self { hits: AtomicU64::new(0), misses: AtomicU64::new(0), sets: AtomicU64::new(0), deletes: AtomicU64::new(0), errors: AtomicU64::new(0) } }
    fn to_stats(&self) -> CacheStats { CacheStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed), sets: self.sets.load(Ordering::Relaxed), deletes: self.deletes.load(Ordering::Relaxed), errors: self.errors.load(Ordering::Relaxed) } }
}

pub struct CacheManager { config: CacheConfig, backend: Box<dyn CacheBackend>, stats: Arc<AtomicStats> }

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self { Self { config, backend, stats: Arc::new(AtomicStats::new()) } }

    pub fn is_enabled(&self) -> bool { self.config.enabled }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        if !self.config.enabled { return Ok(None); }
        let prefixed = self.prefix_key(key);
        match self.backend.get(&prefixed).await {
            Ok(Some(data)) => { self.stats.hits.fetch_add(1, Ordering::Relaxed); Ok(Some(data)) }
            Ok(None) => { self.stats.misses.fetch_add(1, Ordering::Relaxed); Ok(None) }
            Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) }
        }
    }

    pub async fn set(&self, key: &CacheKey, value: &[u8]) -> Result<()> { self.set_with_ttl(key, value, self.config.default_ttl).await }

    pub async fn set_with_ttl(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        if !self.config.enabled { return Ok(()); }
        if value.len() > self.config.max_entry_size { return Ok(()); }
        let prefixed = self.prefix_key(key);
        match self.backend.set(&prefixed, value, ttl).await { Ok(()) => { self.stats.sets.fetch_add(1, Ordering::Relaxed); Ok(()) } Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) } }
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        if !self.config.enabled { return Ok(false); }
        let prefixed = self.prefix_key(key);
        match self.backend.delete(&prefixed).await { Ok(d) => { if d { self.stats.deletes.fetch_add(1, Ordering::Relaxed); } Ok(d) } Err(e) => { self.stats.errors.fetch_add(1, Ordering::Relaxed); Err(e) } }
    }

    pub async fn clear(&self) -> Result<()> { self.backend.clear().await }

    pub fn stats(&self) -> CacheStats { self.stats.to_stats() }
    pub fn backend_name(&self) -> &'static str { self.backend.name() }

    fn prefix_key(&self, key: &CacheKey) -> CacheKey {
        if let Some(ref p) = self.config.key_prefix { CacheKey::new(format!("{}:{}", p, key.hash)) } else { key.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    #[tokio::test]
    async fn tracks_hits_and_misses() {
        let cache = CacheManager::new(CacheConfig::new(), Box::new(MemoryCache::new(8)));
        let key = CacheKey::new("k");
        assert_eq!(cache.get(&key).await.unwrap(), None);
        cache.set(&key, b"body").await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"body".to_vec()));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (1, 1, 1));
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn disabled_manager_is_inert() {
        let cache = CacheManager::new(CacheConfig::new().with_enabled(false), Box::new(MemoryCache::new(8)));
        cache.set(&"k".into(), b"v").await.unwrap();
        assert_eq!(cache.get(&"k".into()).await.unwrap(), None);
        assert_eq!(cache.stats().sets, 0);
    }

    #[tokio::test]
    async fn prefix_separates_namespaces() {
        let backend = Box::new(MemoryCache::new(8));
        let cache = CacheManager::new(CacheConfig::new().with_key_prefix("v1"), backend);
        cache.set(&"k".into(), b"v").await.unwrap();
        assert!(cache.delete(&"k".into()).await.unwrap());
        assert_eq!(cache.stats().deletes, 1);
    }

    #[tokio::test]
    async fn entries_over_size_limit_are_skipped() {
        let cache = CacheManager::new(CacheConfig::new().with_max_entry_size(2), Box::new(MemoryCache::new(8)));
        cache.set(&"k".into(), b"long").await.unwrap();
        assert_eq!(cache.get(&"k".into()).await.unwrap(), None);
    }

    #[test]
    fn mode_read_write_matrix() {
        assert!(!CacheMode::OnlyRemote.reads_cache());
        assert!(!CacheMode::OnlyRemote.writes_cache());
        assert!(CacheMode::FirstRemote.writes_cache());
        assert!(CacheMode::OnlyCache.reads_cache());
        assert!(!CacheMode::OnlyCache.writes_cache());
    }
}
