use crate::cache::{CacheKeyGenerator, CacheManager};
use crate::client::builder::NetWorkerBuilder;
use crate::config::ClientConfig;
use crate::dispatch::{Dispatcher, TagRegistry};
use crate::download::DownloadManager;
use crate::envelope::SuccessPolicy;
use crate::interceptors::InterceptorPipeline;
use crate::transport::HttpTransport;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) base_url: Url,
    pub(crate) transport: HttpTransport,
    pub(crate) pipeline: InterceptorPipeline,
    pub(crate) cache: Option<CacheManager>,
    pub(crate) cache_keys: CacheKeyGenerator,
    pub(crate) success: SuccessPolicy,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) tags: TagRegistry,
    pub(crate) downloads: Arc<DownloadManager>,
}

/// A configured client handle. Cheap to clone; clones share the connection
/// pool, cache, io pool and download registry.
#[derive(Clone)]
pub struct NetWorker {
    pub(crate) inner: Arc<Inner>,
}

impl NetWorker {
    pub fn builder() -> NetWorkerBuilder {
        NetWorkerBuilder::new()
    }

    /// Build from a YAML config file.
    pub fn from_config_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        NetWorkerBuilder::from_config(ClientConfig::from_yaml_file(path)?).build()
    }

    /// Frozen configuration, after environment overrides and defaults.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn success_policy(&self) -> &SuccessPolicy {
        &self.inner.success
    }

    pub fn cache(&self) -> Option<&CacheManager> {
        self.inner.cache.as_ref()
    }

    pub async fn clear_cache(&self) -> Result<()> {
        match self.inner.cache {
            Some(ref cache) => cache.clear().await,
            None => Ok(()),
        }
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.inner.downloads
    }

    /// Cancel every in-flight call tagged with `tag`.
    pub fn cancel_tag(&self, tag: &str) -> bool {
        self.inner.tags.cancel_tag(tag)
    }

    /// Cancel every in-flight call. Downloads are cancelled per URL through
    /// [`DownloadManager::cancel`].
    pub fn cancel_all(&self) {
        self.inner.tags.cancel_all()
    }
}

impl fmt::Debug for NetWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetWorker")
            .field("base_url", &self.inner.base_url.as_str())
            .field("cache", &self.inner.cache.as_ref().map(|c| c.backend_name()))
            .field("interceptors", &self.inner.pipeline.len())
            .field("main_context", &self.inner.dispatcher.has_main_context())
            .finish()
    }
}
