//! Request execution: one function for every verb.
//!
//! resolve → per-call headers/query → interceptors → cache (per mode) →
//! transport → status check. Decoding happens in the caller's decoder.

use std::sync::Arc;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use super::call::CallOptions;
use super::core::Inner;
use crate::cache::{CacheKey, CacheManager, CacheMode};
use crate::transport::{Fetched, Method, RequestParts, RequestSpec};
use crate::{Error, Result};

pub(crate) async fn execute(
    inner: &Arc<Inner>,
    spec: &RequestSpec,
    options: &CallOptions,
) -> Result<Fetched> {
    let mut parts = RequestParts::resolve(&inner.base_url, spec)?;
    for (name, value) in &options.headers {
        parts.set_header(name, value);
    }
    for (name, value) in &options.query {
        parts.set_query(name, value);
    }

    let mode = effective_mode(inner, spec.method, options.cache_mode);
    let request_id = Uuid::new_v4().to_string();
    let span = debug_span!("call", request_id = %request_id, method = %spec.method, cache = ?mode);
    let owned = inner.clone();
    inner
        .pipeline
        .execute(parts, move |parts| async move {
            fetch_with_cache(&owned, &parts, mode).await
        })
        .instrument(span)
        .await
}

/// Only GETs are cached, and only when the client has a cache.
fn effective_mode(inner: &Inner, method: Method, requested: Option<CacheMode>) -> CacheMode {
    if method != Method::Get || inner.cache.is_none() {
        return CacheMode::OnlyRemote;
    }
    requested.unwrap_or(inner.config.cache.mode)
}

async fn fetch_with_cache(inner: &Inner, parts: &RequestParts, mode: CacheMode) -> Result<Fetched> {
    let cache = match inner.cache {
        Some(ref cache) if mode.reads_cache() => cache,
        _ => return inner.transport.fetch(parts).await,
    };
    let key = inner
        .cache_keys
        .generate(parts.method.as_str(), &parts.url, None);

    match mode {
        CacheMode::OnlyRemote => inner.transport.fetch(parts).await,
        CacheMode::OnlyCache => cached(cache, &key)
            .await
            .ok_or_else(|| Error::unknown(format!("no cached response for {}", parts.url))),
        CacheMode::FirstCache => {
            if let Some(hit) = cached(cache, &key).await {
                return Ok(hit);
            }
            let fresh = inner.transport.fetch(parts).await?;
            store(cache, &key, mode, &fresh).await;
            Ok(fresh)
        }
        CacheMode::FirstRemote => match inner.transport.fetch(parts).await {
            Ok(fresh) => {
                store(cache, &key, mode, &fresh).await;
                Ok(fresh)
            }
            Err(e) if e.is_remote_unavailable() => match cached(cache, &key).await {
                Some(hit) => {
                    debug!(url = %parts.url, error = %e, "remote unavailable, serving cached response");
                    Ok(hit)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        },
    }
}

async fn cached(cache: &CacheManager, key: &CacheKey) -> Option<Fetched> {
    match cache.get(key).await {
        Ok(Some(body)) => {
            debug!(key = %key, "cache hit");
            Some(Fetched {
                status: 200,
                body: body.into(),
                from_cache: true,
            })
        }
        Ok(None) => None,
        Err(e) => {
            warn!(key = %key, error = %e, "cache read failed");
            None
        }
    }
}

async fn store(cache: &CacheManager, key: &CacheKey, mode: CacheMode, fetched: &Fetched) {
    if !mode.writes_cache() {
        return;
    }
    if let Err(e) = cache.set(key, &fetched.body).await {
        warn!(key = %key, error = %e, "cache write failed");
    }
}
