//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
    pub url: Option<String>,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into(), url: None }
    }
    pub fn with_url(mut self, url: impl Into<String>) -> Self { self.url = Some(url.into()); self }
    pub fn as_str(&self) -> &str { &self.hash }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.hash) }
}

impl From<&str> for CacheKey { fn from(s: &str) -> Self { Self::new(s) } }
impl From<String> for CacheKey { fn from(s: String) -> Self { Self::new(s) } }

/// Derives keys from the request method, the URL (query pairs sorted so
/// parameter order does not matter) and an optional body.
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self { Self { salt: None } }
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self { self.salt = Some(salt.into()); self }

    pub fn generate(&self, method: &str, url: &Url, body: Option<&[u8]>) -> CacheKey {
        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);
        let mut query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        query.sort();

        let mut parts: BTreeMap<&str, String> = BTreeMap::new();
        parts.insert("method", method.to_ascii_uppercase());
        parts.insert("url", base.to_string());
        parts.insert("query", serde_json::to_string(&query).unwrap_or_default());
        if let Some(ref s) = self.salt { parts.insert("salt", s.clone()); }

        let canonical = serde_json::to_string(&parts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        if let Some(body) = body { hasher.update(body); }
        let hash: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        CacheKey::new(hash).with_url(url.as_str())
    }
}

impl Default for CacheKeyGenerator { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url { Url::parse(s).unwrap() }

    #[test]
    fn query_order_does_not_change_key() {
        let gen = CacheKeyGenerator::new();
        let a = gen.generate("GET", &url("https://api.example.com/news?a=1&b=2"), None);
        let b = gen.generate("get", &url("https://api.example.com/news?b=2&a=1"), None);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn different_inputs_give_different_keys() {
        let gen = CacheKeyGenerator::new();
        let base = gen.generate("GET", &url("https://api.example.com/news/1"), None);
        assert_ne!(base, gen.generate("GET", &url("https://api.example.com/news/2"), None));
        assert_ne!(base.hash, gen.generate("POST", &url("https://api.example.com/news/1"), None).hash);
        assert_ne!(base.hash, gen.generate("GET", &url("https://api.example.com/news/1"), Some(b"x")).hash);
        assert_ne!(base.hash, CacheKeyGenerator::new().with_salt("v2").generate("GET", &url("https://api.example.com/news/1"), None).hash);
    }

    #[test]
    fn keys_are_hex_sha256() {
        let key = CacheKeyGenerator::new().generate("GET", &url("https://api.example.com/"), None);
        assert_eq!(key.hash.len(), 64);
        assert!(key.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
