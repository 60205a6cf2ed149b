use crate::cache::{
    CacheBackend, CacheConfig, CacheKeyGenerator, CacheManager, CacheMode, DiskCache, MemoryCache,
};
use crate::client::core::{Inner, NetWorker};
use crate::config::{
    CacheSettings, ClientConfig, CookieMode, EnvOverrides, PoolConfig, Timeouts, TlsPins,
};
use crate::dispatch::{Dispatcher, IoPool, MainContext, TagRegistry};
use crate::download::DownloadManager;
use crate::envelope::SuccessPolicy;
use crate::interceptors::{
    HeaderInterceptor, InjectMode, Interceptor, InterceptorPipeline, LoggingInterceptor,
    QueryInterceptor,
};
use crate::transport::{CookiePolicy, HttpTransport};
use crate::{Error, ErrorContext, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use url::Url;

/// Builder for [`NetWorker`].
///
/// Settings left unset fall back to the `NETKIT_*` environment variables,
/// then to the documented defaults. `build` validates and freezes the result.
pub struct NetWorkerBuilder {
    base_url: Option<String>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    pool: Option<PoolConfig>,
    proxy: Option<String>,
    /// Overwrite per-call values.
    headers: BTreeMap<String, String>,
    /// Only set when the call did not.
    added_headers: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    added_query: BTreeMap<String, String>,
    cache: CacheSettings,
    cache_backend: Option<Box<dyn CacheBackend>>,
    cookies: CookiePolicy,
    custom_cookies_required: bool,
    tls: Option<TlsPins>,
    logging: bool,
    user_agent: Option<String>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    success: SuccessPolicy,
    main: Option<MainContext>,
    io_handle: Option<Handle>,
    io_threads: Option<usize>,
}

impl NetWorkerBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            pool: None,
            proxy: None,
            headers: BTreeMap::new(),
            added_headers: BTreeMap::new(),
            query: BTreeMap::new(),
            added_query: BTreeMap::new(),
            cache: CacheSettings::default(),
            cache_backend: None,
            cookies: CookiePolicy::None,
            custom_cookies_required: false,
            tls: None,
            logging: true,
            user_agent: None,
            interceptors: Vec::new(),
            success: SuccessPolicy::default(),
            main: None,
            io_handle: None,
            io_threads: None,
        }
    }

    /// Seed every serializable setting from a config file.
    ///
    /// Timeouts and pool settings left at their built-in defaults count as
    /// unset, so `NETKIT_*` environment overrides still apply to them.
    /// A `custom` cookie mode still needs [`NetWorkerBuilder::cookies`].
    pub fn from_config(config: ClientConfig) -> Self {
        let mut b = Self::new();
        if !config.base_url.is_empty() {
            b.base_url = Some(config.base_url);
        }
        let defaults = ClientConfig::default();
        let set = |value: Duration, default: Duration| (value != default).then_some(value);
        b.connect_timeout = set(config.timeouts.connect, defaults.timeouts.connect);
        b.read_timeout = set(config.timeouts.read, defaults.timeouts.read);
        b.write_timeout = set(config.timeouts.write, defaults.timeouts.write);
        b.pool = (config.pool != defaults.pool).then_some(config.pool);
        b.proxy = config.proxy;
        b.headers = config.headers;
        b.query = config.query_defaults;
        b.cache = config.cache;
        b.cookies = match config.cookies {
            CookieMode::None | CookieMode::Custom => CookiePolicy::None,
            CookieMode::Default => CookiePolicy::Default,
        };
        b.custom_cookies_required = config.cookies == CookieMode::Custom;
        b.tls = config.tls;
        b.logging = config.logging;
        b.user_agent = config.user_agent;
        b
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Default header that overwrites whatever a call set.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self.headers.insert(k.into(), v.into());
        }
        self
    }

    /// Default header used only when a call did not set it.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.added_headers.insert(name.into(), value.into());
        self
    }

    /// Default query parameter that overwrites whatever a call set.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn add_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.added_query.insert(name.into(), value.into());
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = Some(dir.into());
        self
    }

    pub fn cache_max_size(mut self, bytes: u64) -> Self {
        self.cache.max_size_bytes = bytes;
        self
    }

    pub fn cache_max_age(mut self, age: Duration) -> Self {
        self.cache.max_age = age;
        self
    }

    /// Default mode for GET calls; calls can override it.
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache.mode = mode;
        self
    }

    /// Replace the on-disk store. Also enables caching.
    pub fn cache_backend<B: CacheBackend + 'static>(mut self, backend: B) -> Self {
        self.cache_backend = Some(Box::new(backend));
        self.cache.enabled = true;
        self
    }

    pub fn cookies(mut self, policy: CookiePolicy) -> Self {
        self.cookies = policy;
        self
    }

    pub fn tls_pins<H, C>(mut self, hosts: H, certificates: C) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<PathBuf>,
    {
        self.tls = Some(TlsPins {
            hosts: hosts.into_iter().map(Into::into).collect(),
            certificates: certificates.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    pub fn connection_pool(mut self, max_idle: usize, keep_alive: Duration) -> Self {
        self.pool = Some(PoolConfig {
            max_idle,
            keep_alive,
        });
        self
    }

    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Runs after the default header/query injection and before logging.
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Envelope codes that count as success (default: only `0`).
    pub fn success_codes<I: IntoIterator<Item = i64>>(mut self, codes: I) -> Self {
        self.success = SuccessPolicy::codes(codes);
        self
    }

    pub fn success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.success = policy;
        self
    }

    /// Where [`crate::Delivery::Main`] results go. Without one they are
    /// delivered on the io pool.
    pub fn main_context(mut self, ctx: MainContext) -> Self {
        self.main = Some(ctx);
        self
    }

    /// Run network work on an existing runtime instead of a dedicated pool.
    pub fn io_runtime(mut self, handle: Handle) -> Self {
        self.io_handle = Some(handle);
        self
    }

    pub fn io_threads(mut self, threads: usize) -> Self {
        self.io_threads = Some(threads.max(1));
        self
    }

    fn resolve_base_url(raw: Option<&str>) -> Result<Url> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Err(Error::configuration_with_context(
                "base URL is required",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("builder"),
            ));
        }
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        let url = Url::parse(&with_slash).map_err(|e| {
            Error::configuration_with_context(
                "base URL is not a valid absolute URL",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(format!("{}: {}", raw, e))
                    .with_source("builder"),
            )
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "base URL must be an http(s) URL",
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_details(raw.to_string())
                    .with_source("builder"),
            ));
        }
        Ok(url)
    }

    fn open_cache(settings: &CacheSettings, custom: Option<Box<dyn CacheBackend>>) -> Option<CacheManager> {
        if !settings.enabled {
            return None;
        }
        let backend: Box<dyn CacheBackend> = match custom {
            Some(b) => b,
            None => {
                let dir = settings.resolved_dir();
                match DiskCache::new(&dir, settings.max_size_bytes) {
                    Ok(disk) => Box::new(disk),
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "cannot open disk cache, using memory");
                        Box::new(MemoryCache::new(256))
                    }
                }
            }
        };
        let config = CacheConfig::new()
            .with_ttl(settings.max_age)
            .with_max_entry_size(usize::try_from(settings.max_size_bytes).unwrap_or(usize::MAX));
        Some(CacheManager::new(config, backend))
    }

    /// Validate and materialize the client.
    pub fn build(self) -> Result<NetWorker> {
        let base_url = Self::resolve_base_url(self.base_url.as_deref())?;
        if self.custom_cookies_required && matches!(self.cookies, CookiePolicy::None) {
            return Err(Error::configuration_with_context(
                "custom cookie mode needs a cookie store",
                ErrorContext::new()
                    .with_field_path("cookies")
                    .with_source("builder"),
            ));
        }

        let env = EnvOverrides::from_env();
        let defaults = ClientConfig::default();
        let timeouts = Timeouts {
            connect: self
                .connect_timeout
                .or(env.connect_timeout)
                .unwrap_or(defaults.timeouts.connect),
            read: self
                .read_timeout
                .or(env.read_timeout)
                .unwrap_or(defaults.timeouts.read),
            write: self
                .write_timeout
                .or(env.write_timeout)
                .unwrap_or(defaults.timeouts.write),
        };
        let pool = self.pool.unwrap_or_else(|| PoolConfig {
            max_idle: env.pool_max_idle.unwrap_or(defaults.pool.max_idle),
            keep_alive: env.pool_keep_alive.unwrap_or(defaults.pool.keep_alive),
        });

        let config = ClientConfig {
            base_url: base_url.to_string(),
            headers: self.headers.clone(),
            query_defaults: self.query.clone(),
            timeouts,
            pool,
            cache: self.cache.clone(),
            cookies: self.cookies.mode(),
            tls: self.tls,
            proxy: self.proxy.or(env.proxy),
            logging: self.logging,
            user_agent: self.user_agent,
        };

        let transport = HttpTransport::new(&config, &self.cookies)?;

        let mut pipeline = InterceptorPipeline::new();
        if !self.headers.is_empty() {
            pipeline = pipeline.with(HeaderInterceptor::new(self.headers, InjectMode::Update));
        }
        if !self.added_headers.is_empty() {
            pipeline = pipeline.with(HeaderInterceptor::new(self.added_headers, InjectMode::Add));
        }
        if !self.query.is_empty() {
            pipeline = pipeline.with(QueryInterceptor::new(self.query, InjectMode::Update));
        }
        if !self.added_query.is_empty() {
            pipeline = pipeline.with(QueryInterceptor::new(self.added_query, InjectMode::Add));
        }
        for ic in self.interceptors {
            pipeline.push(ic);
        }
        if config.logging {
            pipeline = pipeline.with(LoggingInterceptor);
        }

        let io = match self.io_handle {
            Some(handle) => IoPool::from_handle(handle),
            None => IoPool::dedicated(self.io_threads.or(env.io_threads))?,
        };

        let cache = Self::open_cache(&config.cache, self.cache_backend);
        debug!(
            base_url = %base_url,
            cache = cache.as_ref().map(|c| c.backend_name()).unwrap_or("off"),
            interceptors = pipeline.len(),
            "netkit client built"
        );

        Ok(NetWorker {
            inner: Arc::new(Inner {
                config,
                base_url,
                transport,
                pipeline,
                cache,
                cache_keys: CacheKeyGenerator::new(),
                success: self.success,
                dispatcher: Dispatcher::new(io, self.main),
                tags: TagRegistry::new(),
                downloads: Arc::new(DownloadManager::new()),
            }),
        })
    }
}

impl Default for NetWorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
