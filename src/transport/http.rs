use crate::config::{ClientConfig, Timeouts, TlsPins};
use crate::transport::request::{Encoding, MultipartField, RequestParts};
use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::Proxy;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Cookie handling for a client.
#[derive(Clone, Default)]
pub enum CookiePolicy {
    /// Cookies are neither stored nor sent.
    #[default]
    None,
    /// An in-memory jar private to the client.
    Default,
    /// A caller-owned store, e.g. one persisted between runs.
    Custom(Arc<dyn CookieStore>),
}

impl fmt::Debug for CookiePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookiePolicy::None => f.write_str("None"),
            CookiePolicy::Default => f.write_str("Default"),
            CookiePolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl CookiePolicy {
    pub fn mode(&self) -> crate::config::CookieMode {
        match self {
            CookiePolicy::None => crate::config::CookieMode::None,
            CookiePolicy::Default => crate::config::CookieMode::Default,
            CookiePolicy::Custom(_) => crate::config::CookieMode::Custom,
        }
    }
}

// `cookie_provider` wants a sized store.
struct SharedCookieStore(Arc<dyn CookieStore>);

impl CookieStore for SharedCookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.0.set_cookies(cookie_headers, url)
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.0.cookies(url)
    }
}

/// A response whose status has already been checked.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub status: u16,
    pub body: Bytes,
    pub from_cache: bool,
}

/// Thin wrapper over a configured `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
    timeouts: Timeouts,
    pins: Option<TlsPins>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, cookies: &CookiePolicy) -> Result<Self> {
        // No client-wide total timeout: downloads enforce an idle read
        // deadline per chunk instead.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeouts.connect)
            .pool_max_idle_per_host(config.pool.max_idle)
            .pool_idle_timeout(Some(config.pool.keep_alive));

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        }

        if let Some(ref proxy_url) = config.proxy {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    "invalid proxy URL",
                    ErrorContext::new()
                        .with_field_path("proxy")
                        .with_details(e.to_string())
                        .with_source("transport"),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        builder = match cookies {
            CookiePolicy::None => builder,
            CookiePolicy::Default => builder.cookie_provider(Arc::new(Jar::default())),
            CookiePolicy::Custom(store) => {
                builder.cookie_provider(Arc::new(SharedCookieStore(store.clone())))
            }
        };

        if let Some(ref pins) = config.tls {
            builder = builder.tls_built_in_root_certs(false);
            for (i, path) in pins.certificates.iter().enumerate() {
                let field = format!("tls.certificates[{}]", i);
                let pem = std::fs::read(path).map_err(|e| {
                    Error::configuration_with_context(
                        "cannot read pinned certificate",
                        ErrorContext::new()
                            .with_field_path(field.clone())
                            .with_details(format!("{}: {}", path.display(), e))
                            .with_source("transport"),
                    )
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    Error::configuration_with_context(
                        "invalid pinned certificate",
                        ErrorContext::new()
                            .with_field_path(field)
                            .with_details(e.to_string())
                            .with_source("transport"),
                    )
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                "cannot build HTTP client",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("transport"),
            )
        })?;

        Ok(Self {
            client,
            timeouts: config.timeouts.clone(),
            pins: config.tls.clone(),
        })
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Deadline for a whole exchange: read, plus write when a body is sent.
    pub fn deadline_for(&self, body: &Encoding) -> Duration {
        if body.has_body() {
            self.timeouts.read + self.timeouts.write
        } else {
            self.timeouts.read
        }
    }

    fn check_pins(&self, url: &Url) -> Result<()> {
        let Some(ref pins) = self.pins else {
            return Ok(());
        };
        if url.scheme() != "https" {
            return Ok(());
        }
        let host = url.host_str().unwrap_or_default();
        if pins.allows(host) {
            Ok(())
        } else {
            Err(Error::configuration_with_context(
                "host is not in the TLS pin set",
                ErrorContext::new()
                    .with_field_path("tls.hosts")
                    .with_details(host.to_string())
                    .with_source("transport"),
            ))
        }
    }

    async fn build_request(
        &self,
        parts: &RequestParts,
        timeout: Option<Duration>,
    ) -> Result<reqwest::RequestBuilder> {
        self.check_pins(&parts.url)?;
        let mut req = self
            .client
            .request(parts.method.to_reqwest(), parts.url.clone());
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        for (name, value) in &parts.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req = match &parts.body {
            Encoding::Empty | Encoding::Query(_) => req,
            Encoding::Form(fields) => req.form(fields),
            Encoding::Json(raw) => req
                .header(reqwest::header::CONTENT_TYPE, "application/json; charset=utf-8")
                .body(raw.clone()),
            Encoding::Body(value) => req.json(value),
            Encoding::Raw { content_type, data } => req
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(data.clone()),
            Encoding::Multipart(fields) => req.multipart(multipart_form(fields).await?),
        };
        Ok(req)
    }

    /// Send and return the raw response without checking its status.
    pub async fn send(&self, parts: &RequestParts, timeout: Option<Duration>) -> Result<reqwest::Response> {
        let req = self.build_request(parts, timeout).await?;
        debug!(method = %parts.method, url = %parts.url, "sending request");
        Ok(req.send().await?)
    }

    /// Send, require a 2xx status and read the whole body.
    pub async fn fetch(&self, parts: &RequestParts) -> Result<Fetched> {
        let resp = self.send(parts, Some(self.deadline_for(&parts.body))).await?;
        let resp = ensure_success(resp).await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        Ok(Fetched {
            status,
            body,
            from_cache: false,
        })
    }
}

/// Map non-2xx responses to [`Error::HttpStatus`] carrying the body text.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

async fn multipart_form(fields: &[MultipartField]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = match field {
            MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
            MultipartField::File {
                name,
                path,
                file_name,
                mime,
            } => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    Error::invalid_request_with_context(
                        "cannot read upload file",
                        ErrorContext::new()
                            .with_field_path(name.clone())
                            .with_details(format!("{}: {}", path.display(), e)),
                    )
                })?;
                let file_name = file_name.clone().unwrap_or_else(|| {
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| name.clone())
                });
                let mut part = reqwest::multipart::Part::bytes(data).file_name(file_name);
                if let Some(mime) = mime {
                    part = part.mime_str(mime).map_err(|e| {
                        Error::invalid_request_with_context(
                            "invalid MIME type",
                            ErrorContext::new()
                                .with_field_path(name.clone())
                                .with_details(e.to_string()),
                        )
                    })?;
                }
                form.part(name.clone(), part)
            }
        };
    }
    Ok(form)
}
