//! Response caching with pluggable backends.
//!
//! GET responses are cached by method, URL and sorted query. A per-call
//! [`CacheMode`] decides whether the network or the cache is consulted first.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | TTL, size limit, key prefix and hit/miss statistics |
//! | [`CacheBackend`] | Trait for storage backends |
//! | [`DiskCache`] | Size-bounded on-disk store (the default) |
//! | [`MemoryCache`] | In-memory LRU store |
//! | [`NullCache`] | No-op store |
//! | [`CacheKeyGenerator`] | Key derivation from request parts |
//!
//! ```rust
//! use netkit::cache::{CacheConfig, CacheManager, MemoryCache};
//! use std::time::Duration;
//!
//! let cache = CacheManager::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(600)),
//!     Box::new(MemoryCache::new(256)),
//! );
//! assert_eq!(cache.backend_name(), "memory");
//! ```

mod backend;
mod disk;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use disk::DiskCache;
pub use key::{CacheKey, CacheKeyGenerator};
pub use manager::{CacheConfig, CacheManager, CacheMode, CacheStats};
