//! Frozen client configuration.
//!
//! [`ClientConfig`] is the serializable part of a client: everything that
//! can be written in a YAML file or derived from the environment. Handles
//! that cannot be serialized (custom cookie stores, cache backends,
//! interceptors) live on the builder.

use crate::cache::CacheMode;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POOL_MAX_IDLE: usize = 5;
pub const DEFAULT_POOL_KEEP_ALIVE: Duration = Duration::from_secs(8);
pub const DEFAULT_CACHE_MAX_SIZE: u64 = 10 * 1024 * 1024;
/// Three days.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 3);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "secs")]
    pub connect: Duration,
    #[serde(with = "secs")]
    pub read: Duration,
    /// Added on top of `read` for requests that carry a body.
    #[serde(with = "secs")]
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            write: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle: usize,
    #[serde(with = "secs")]
    pub keep_alive: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_POOL_MAX_IDLE,
            keep_alive: DEFAULT_POOL_KEEP_ALIVE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    /// On-disk location; `None` means `<user cache dir>/netkit/http`.
    pub dir: Option<PathBuf>,
    pub max_size_bytes: u64,
    #[serde(with = "secs")]
    pub max_age: Duration,
    pub mode: CacheMode,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_size_bytes: DEFAULT_CACHE_MAX_SIZE,
            max_age: DEFAULT_CACHE_MAX_AGE,
            mode: CacheMode::FirstRemote,
        }
    }
}

impl CacheSettings {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(default_cache_dir)
    }
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("netkit")
        .join("http")
}

/// Serializable cookie mode. Custom stores are set on the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieMode {
    #[default]
    None,
    Default,
    Custom,
}

/// Certificate pinning: only `hosts` may be contacted over TLS, and only
/// the listed PEM certificates are trusted as roots.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPins {
    pub hosts: Vec<String>,
    pub certificates: Vec<PathBuf>,
}

impl TlsPins {
    pub fn allows(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub query_defaults: BTreeMap<String, String>,
    pub timeouts: Timeouts,
    pub pool: PoolConfig,
    pub cache: CacheSettings,
    pub cookies: CookieMode,
    pub tls: Option<TlsPins>,
    pub proxy: Option<String>,
    pub logging: bool,
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            headers: BTreeMap::new(),
            query_defaults: BTreeMap::new(),
            timeouts: Timeouts::default(),
            pool: PoolConfig::default(),
            cache: CacheSettings::default(),
            cookies: CookieMode::None,
            tls: None,
            proxy: None,
            logging: true,
            user_agent: None,
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| {
            Error::configuration_with_context(
                "invalid client configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("config"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                "cannot read client configuration",
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_details(e.to_string())
                    .with_source("config"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }
}

/// Environment overrides, consulted only for settings the caller left unset.
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvOverrides {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub proxy: Option<String>,
    pub pool_max_idle: Option<usize>,
    pub pool_keep_alive: Option<Duration>,
    pub io_threads: Option<usize>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            connect_timeout: env_secs("NETKIT_CONNECT_TIMEOUT_SECS"),
            read_timeout: env_secs("NETKIT_READ_TIMEOUT_SECS"),
            write_timeout: env_secs("NETKIT_WRITE_TIMEOUT_SECS"),
            proxy: std::env::var("NETKIT_PROXY_URL").ok().filter(|s| !s.is_empty()),
            pool_max_idle: env_parse("NETKIT_POOL_MAX_IDLE"),
            pool_keep_alive: env_secs("NETKIT_POOL_KEEP_ALIVE_SECS"),
            io_threads: env_parse::<usize>("NETKIT_IO_THREADS").filter(|n| *n > 0),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
