//! Interceptor hooks around every request.
//!
//! The client installs its own interceptors for default headers, default
//! query parameters and logging; applications can add more through
//! [`crate::NetWorkerBuilder::interceptor`]. Hooks run in registration order.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::transport::{Fetched, RequestParts};
use crate::{Error, Result};

/// What interceptors see of a completed exchange.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: u16,
    pub bytes: usize,
    pub from_cache: bool,
    pub elapsed: Duration,
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Runs before the cache and the network; returning an error aborts the call.
    async fn on_request(&self, _req: &mut RequestParts) -> Result<()> {
        Ok(())
    }

    async fn on_response(&self, _req: &RequestParts, _resp: &ResponseContext) {}

    async fn on_error(&self, _req: &RequestParts, _err: &Error) {}
}

/// Whether injected values overwrite ones already on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectMode {
    /// Keep an existing value.
    Add,
    /// Replace an existing value.
    Update,
}

/// Injects a fixed set of headers into every request.
#[derive(Debug, Clone)]
pub struct HeaderInterceptor {
    headers: Vec<(String, String)>,
    mode: InjectMode,
}

impl HeaderInterceptor {
    pub fn new<I, K, V>(headers: I, mode: InjectMode) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            mode,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[async_trait]
impl Interceptor for HeaderInterceptor {
    async fn on_request(&self, req: &mut RequestParts) -> Result<()> {
        for (name, value) in &self.headers {
            match self.mode {
                InjectMode::Add => req.add_header(name, value),
                InjectMode::Update => req.set_header(name, value),
            }
        }
        Ok(())
    }
}

/// Appends default query parameters to every request.
#[derive(Debug, Clone)]
pub struct QueryInterceptor {
    params: Vec<(String, String)>,
    mode: InjectMode,
}

impl QueryInterceptor {
    pub fn new<I, K, V>(params: I, mode: InjectMode) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            mode,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[async_trait]
impl Interceptor for QueryInterceptor {
    async fn on_request(&self, req: &mut RequestParts) -> Result<()> {
        for (name, value) in &self.params {
            match self.mode {
                InjectMode::Add => req.add_query(name, value),
                InjectMode::Update => req.set_query(name, value),
            }
        }
        Ok(())
    }
}

/// Logs each exchange through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn on_request(&self, req: &mut RequestParts) -> Result<()> {
        debug!(method = %req.method, url = %req.url, headers = req.headers.len(), "request");
        Ok(())
    }

    async fn on_response(&self, req: &RequestParts, resp: &ResponseContext) {
        info!(
            method = %req.method,
            url = %req.url,
            status = resp.status,
            bytes = resp.bytes,
            from_cache = resp.from_cache,
            elapsed_ms = resp.elapsed.as_millis() as u64,
            "response"
        );
    }

    async fn on_error(&self, req: &RequestParts, err: &Error) {
        warn!(method = %req.method, url = %req.url, kind = %err.kind(), error = %err, "request failed");
    }
}

/// Runs hooks in order around the actual exchange.
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run only the `on_request` hooks, e.g. for downloads that bypass the cache.
    pub(crate) async fn prepare(&self, req: &mut RequestParts) -> Result<()> {
        for ic in &self.interceptors {
            ic.on_request(req).await?;
        }
        Ok(())
    }

    /// Run `on_request` hooks, then `f` with the rewritten request, then
    /// `on_response` or `on_error`.
    pub async fn execute<F, Fut>(&self, mut req: RequestParts, f: F) -> Result<Fetched>
    where
        F: FnOnce(RequestParts) -> Fut,
        Fut: std::future::Future<Output = Result<Fetched>>,
    {
        for ic in &self.interceptors {
            if let Err(err) = ic.on_request(&mut req).await {
                for ic in &self.interceptors {
                    ic.on_error(&req, &err).await;
                }
                return Err(err);
            }
        }

        let started = Instant::now();
        match f(req.clone()).await {
            Ok(resp) => {
                let ctx = ResponseContext {
                    status: resp.status,
                    bytes: resp.body.len(),
                    from_cache: resp.from_cache,
                    elapsed: started.elapsed(),
                };
                for ic in &self.interceptors {
                    ic.on_response(&req, &ctx).await;
                }
                Ok(resp)
            }
            Err(err) => {
                for ic in &self.interceptors {
                    ic.on_error(&req, &err).await;
                }
                Err(err)
            }
        }
    }
}
