//! Lazy calls and their delivery.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheMode;
use crate::client::core::NetWorker;
use crate::client::execution;
use crate::dispatch::Delivery;
use crate::envelope::{decode_envelope, SuccessPolicy};
use crate::transport::RequestSpec;
use crate::{Error, Result};

pub(crate) type Decoder<T> = Arc<dyn Fn(Bytes, &SuccessPolicy) -> Result<T> + Send + Sync>;

/// Response-typing strategies.
pub(crate) mod decode {
    use super::*;

    pub fn raw() -> Decoder<String> {
        Arc::new(|body: Bytes, _: &SuccessPolicy| {
            String::from_utf8(body.to_vec())
                .map_err(|e| Error::malformed(format!("response is not UTF-8: {}", e)))
        })
    }

    pub fn json<T: DeserializeOwned + 'static>() -> Decoder<T> {
        Arc::new(|body: Bytes, _: &SuccessPolicy| -> Result<T> {
            Ok(serde_json::from_slice(&body)?)
        })
    }

    pub fn envelope<T: DeserializeOwned + 'static>() -> Decoder<T> {
        Arc::new(|body: Bytes, policy: &SuccessPolicy| decode_envelope(&body, policy))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CallOptions {
    pub cache_mode: Option<CacheMode>,
    pub tag: Option<String>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

/// Cancels a call started with [`Call::enqueue`] or [`Call::detach`].
#[derive(Debug, Clone)]
pub struct CallHandle {
    token: CancellationToken,
}

impl CallHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A request that has been described but not sent.
///
/// Nothing happens until one of [`Call::execute`], [`Call::enqueue`],
/// [`Call::enqueue_on`] or [`Call::detach`] is called. The network work
/// always runs on the io pool; every outcome, including cancellation,
/// arrives exactly once through the chosen channel.
pub struct Call<T> {
    worker: NetWorker,
    spec: Result<RequestSpec>,
    decode: Decoder<T>,
    options: CallOptions,
}

impl<T> fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("spec", &self.spec)
            .field("options", &self.options)
            .finish()
    }
}

impl<T: Send + 'static> Call<T> {
    pub(crate) fn new(worker: &NetWorker, spec: Result<RequestSpec>, decode: Decoder<T>) -> Self {
        Self {
            worker: worker.clone(),
            spec,
            decode,
            options: CallOptions::default(),
        }
    }

    /// Override the client's cache mode for this call (GET only).
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.options.cache_mode = Some(mode);
        self
    }

    /// Group this call for [`NetWorker::cancel_tag`].
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options.tag = Some(tag.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((name.into(), value.into()));
        self
    }

    pub fn spec(&self) -> Option<&RequestSpec> {
        self.spec.as_ref().ok()
    }

    /// Run on the io pool and hand the result to the awaiting task.
    pub async fn execute(self) -> Result<T> {
        let token = self.token();
        let io = self.worker.inner.dispatcher.io().clone();
        match io.spawn(self.run(token)).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::unknown(format!("call task failed: {}", e))),
        }
    }

    /// Run on the io pool and deliver the result on the main context.
    pub fn enqueue<F>(self, callback: F) -> CallHandle
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.enqueue_on(Delivery::Main, callback)
    }

    pub fn enqueue_on<F>(self, delivery: Delivery, callback: F) -> CallHandle
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let token = self.token();
        let handle = CallHandle {
            token: token.clone(),
        };
        let dispatcher = self.worker.inner.dispatcher.clone();
        dispatcher.io().clone().spawn(async move {
            let result = self.run(token).await;
            dispatcher.deliver(delivery, move || callback(result)).await;
        });
        handle
    }

    /// Fire and forget. Failures are logged, not returned.
    pub fn detach(self) -> CallHandle {
        let token = self.token();
        let handle = CallHandle {
            token: token.clone(),
        };
        let io = self.worker.inner.dispatcher.io().clone();
        io.spawn(async move {
            let what = self
                .spec
                .as_ref()
                .map(|s| format!("{} {}", s.method, s.path))
                .unwrap_or_default();
            match self.run(token).await {
                Ok(_) => debug!(call = %what, "detached call finished"),
                Err(Error::Cancelled) => debug!(call = %what, "detached call cancelled"),
                Err(e) => warn!(call = %what, kind = %e.kind(), error = %e, "detached call failed"),
            }
        });
        handle
    }

    fn token(&self) -> CancellationToken {
        self.worker.inner.tags.token_for(self.options.tag.as_deref())
    }

    async fn run(self, token: CancellationToken) -> Result<T> {
        let spec = self.spec?;
        let inner = &self.worker.inner;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            r = execution::execute(inner, &spec, &self.options) => {
                r.and_then(|fetched| (self.decode)(fetched.body, &inner.success))
            }
        }
    }
}
