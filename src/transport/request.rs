//! Request description shared by the facade, interceptors and transport.

use crate::{Error, ErrorContext, Result};
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        path: PathBuf,
        /// Overrides the file name sent to the server (defaults to the path's).
        file_name: Option<String>,
        mime: Option<String>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        MultipartField::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        MultipartField::File {
            name: name.into(),
            path: path.into(),
            file_name: None,
            mime: None,
        }
    }

    /// Set the MIME type of a file part; ignored for text parts.
    pub fn with_mime(self, mime: impl Into<String>) -> Self {
        match self {
            MultipartField::File {
                name,
                path,
                file_name,
                ..
            } => MultipartField::File {
                name,
                path,
                file_name,
                mime: Some(mime.into()),
            },
            text => text,
        }
    }
}

/// How a request's parameters travel to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoding {
    Empty,
    /// Appended to the URL query string.
    Query(Vec<(String, String)>),
    /// `application/x-www-form-urlencoded` body.
    Form(Vec<(String, String)>),
    /// A JSON document supplied as a string, sent verbatim.
    Json(String),
    /// A value serialized to JSON.
    Body(serde_json::Value),
    /// Raw bytes with an explicit content type.
    Raw { content_type: String, data: Bytes },
    Multipart(Vec<MultipartField>),
}

impl Encoding {
    pub fn has_body(&self) -> bool {
        !matches!(self, Encoding::Empty | Encoding::Query(_))
    }
}

/// What a facade method asks for, before base URL resolution and interceptors.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub encoding: Encoding,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>, encoding: Encoding) -> Self {
        Self {
            method,
            path: path.into(),
            encoding,
        }
    }
}

/// A fully resolved request, mutable by interceptors.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Encoding,
}

impl RequestParts {
    /// Resolve `spec.path` against `base`; query encodings move into the URL.
    pub fn resolve(base: &Url, spec: &RequestSpec) -> Result<Self> {
        let path = spec.path.trim_start_matches('/');
        let mut url = if spec.path.contains("://") {
            Url::parse(&spec.path)
        } else {
            base.join(path)
        }
        .map_err(|e| {
            Error::invalid_request_with_context(
                "cannot resolve request URL",
                ErrorContext::new()
                    .with_field_path("path")
                    .with_details(format!("{}: {}", spec.path, e)),
            )
        })?;

        let body = match &spec.encoding {
            Encoding::Query(pairs) => {
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs.iter());
                }
                Encoding::Empty
            }
            other => other.clone(),
        };

        Ok(Self {
            method: spec.method,
            url,
            headers: Vec::new(),
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace any existing value.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Insert only when the header is not present yet.
    pub fn add_header(&mut self, name: &str, value: &str) {
        if self.header(name).is_none() {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn set_query(&mut self, name: &str, value: &str) {
        let kept: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(k, _)| k != name)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        self.url.set_query(None);
        {
            let mut q = self.url.query_pairs_mut();
            q.extend_pairs(kept.iter());
            q.append_pair(name, value);
        }
    }

    pub fn add_query(&mut self, name: &str, value: &str) {
        if self.query_param(name).is_none() {
            self.url.query_pairs_mut().append_pair(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/api/4/").unwrap()
    }

    #[test]
    fn paths_resolve_against_base_url() {
        let spec = RequestSpec::new(Method::Get, "/news/12345", Encoding::Empty);
        let parts = RequestParts::resolve(&base(), &spec).unwrap();
        assert_eq!(parts.url.as_str(), "https://api.example.com/api/4/news/12345");
    }

    #[test]
    fn absolute_urls_bypass_base() {
        let spec = RequestSpec::new(Method::Get, "https://cdn.example.com/a.png", Encoding::Empty);
        let parts = RequestParts::resolve(&base(), &spec).unwrap();
        assert_eq!(parts.url.host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn query_encoding_moves_into_url() {
        let spec = RequestSpec::new(
            Method::Get,
            "sections",
            Encoding::Query(vec![("page".into(), "2".into()), ("q".into(), "a b".into())]),
        );
        let parts = RequestParts::resolve(&base(), &spec).unwrap();
        assert_eq!(parts.body, Encoding::Empty);
        assert_eq!(parts.query_param("page").as_deref(), Some("2"));
        assert_eq!(parts.query_param("q").as_deref(), Some("a b"));
    }

    #[test]
    fn header_add_keeps_existing_and_set_replaces() {
        let spec = RequestSpec::new(Method::Get, "x", Encoding::Empty);
        let mut parts = RequestParts::resolve(&base(), &spec).unwrap();
        parts.add_header("Accept", "a");
        parts.add_header("accept", "b");
        assert_eq!(parts.header("ACCEPT"), Some("a"));
        parts.set_header("accept", "c");
        assert_eq!(parts.header("Accept"), Some("c"));
        assert_eq!(parts.headers.len(), 1);
    }

    #[test]
    fn query_add_and_set() {
        let spec = RequestSpec::new(
            Method::Get,
            "x",
            Encoding::Query(vec![("v".into(), "1".into())]),
        );
        let mut parts = RequestParts::resolve(&base(), &spec).unwrap();
        parts.add_query("v", "2");
        assert_eq!(parts.query_param("v").as_deref(), Some("1"));
        parts.set_query("v", "3");
        assert_eq!(parts.query_param("v").as_deref(), Some("3"));
        assert_eq!(parts.url.query_pairs().count(), 1);
    }

    #[test]
    fn body_presence() {
        assert!(!Encoding::Empty.has_body());
        assert!(!Encoding::Query(Vec::new()).has_body());
        assert!(Encoding::Json("{}".into()).has_body());
        assert!(Encoding::Multipart(Vec::new()).has_body());
    }
}
