//! Verb surface of [`NetWorker`].
//!
//! Every method only describes a request; see [`Call`] for how it runs.
//! GET and DELETE parameters go to the query string, POST/PUT/PATCH
//! parameters are form-encoded.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use super::call::{decode, Call, Decoder};
use super::core::NetWorker;
use crate::download::transfer::{self, request_for};
use crate::download::{DownloadHandle, DownloadKind, DownloadStatus, DownloadTarget, Registration};
use crate::transport::{Encoding, Method, MultipartField, RequestParts, RequestSpec};
use crate::{Error, ErrorContext, Result};

fn pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Flatten a serializable object into form fields. Nested values are sent
/// as their JSON text.
fn form_fields<S: Serialize + ?Sized>(fields: &S) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(fields).map_err(|e| invalid_body("fields", e))?;
    match value {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect()),
        other => Err(Error::invalid_request_with_context(
            "form fields must serialize to an object",
            ErrorContext::new()
                .with_field_path("fields")
                .with_details(other.to_string()),
        )),
    }
}

fn json_body<S: Serialize + ?Sized>(body: &S) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| invalid_body("body", e))
}

fn invalid_body(field: &str, e: serde_json::Error) -> Error {
    Error::invalid_request_with_context(
        "cannot encode request body",
        ErrorContext::new()
            .with_field_path(field)
            .with_details(e.to_string()),
    )
}

impl NetWorker {
    fn call<T: Send + 'static>(&self, spec: Result<RequestSpec>, decoder: Decoder<T>) -> Call<T> {
        Call::new(self, spec, decoder)
    }

    fn spec(method: Method, path: &str, encoding: Encoding) -> Result<RequestSpec> {
        Ok(RequestSpec::new(method, path, encoding))
    }

    // Envelope-typed calls.

    pub fn execute_get<T>(&self, path: &str, params: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Get, path, Encoding::Query(pairs(params))),
            decode::envelope(),
        )
    }

    pub fn execute_post<T>(&self, path: &str, fields: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Post, path, Encoding::Form(pairs(fields))),
            decode::envelope(),
        )
    }

    /// POST form fields taken from any serializable object.
    pub fn execute_form<T, S>(&self, path: &str, fields: &S) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
        S: Serialize + ?Sized,
    {
        let spec = form_fields(fields).map(|f| RequestSpec::new(Method::Post, path, Encoding::Form(f)));
        self.call(spec, decode::envelope())
    }

    /// POST an object serialized as JSON.
    pub fn execute_body<T, S>(&self, path: &str, body: &S) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
        S: Serialize + ?Sized,
    {
        let spec = json_body(body).map(|v| RequestSpec::new(Method::Post, path, Encoding::Body(v)));
        self.call(spec, decode::envelope())
    }

    /// POST a JSON document given as text, sent verbatim.
    pub fn execute_json<T>(&self, path: &str, json: impl Into<String>) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Post, path, Encoding::Json(json.into())),
            decode::envelope(),
        )
    }

    pub fn execute_put<T>(&self, path: &str, fields: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Put, path, Encoding::Form(pairs(fields))),
            decode::envelope(),
        )
    }

    pub fn execute_delete<T>(&self, path: &str, params: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Delete, path, Encoding::Query(pairs(params))),
            decode::envelope(),
        )
    }

    pub fn execute_patch<T>(&self, path: &str, fields: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Patch, path, Encoding::Form(pairs(fields))),
            decode::envelope(),
        )
    }

    /// POST raw bytes, e.g. an image, with an explicit content type.
    pub fn upload<T>(&self, path: &str, content_type: &str, data: impl Into<Bytes>) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(
                Method::Post,
                path,
                Encoding::Raw {
                    content_type: content_type.to_string(),
                    data: data.into(),
                },
            ),
            decode::envelope(),
        )
    }

    /// Multipart POST of one file under `field`.
    pub fn upload_file<T>(&self, path: &str, field: &str, file: impl Into<PathBuf>) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.upload_files(path, vec![MultipartField::file(field, file)])
    }

    /// Multipart POST of several parts.
    pub fn upload_files<T>(&self, path: &str, parts: Vec<MultipartField>) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Post, path, Encoding::Multipart(parts)),
            decode::envelope(),
        )
    }

    // Plain JSON, no envelope.

    pub fn get_json<T>(&self, path: &str, params: &[(&str, &str)]) -> Call<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call(
            Self::spec(Method::Get, path, Encoding::Query(pairs(params))),
            decode::json(),
        )
    }

    // Raw body as text.

    pub fn get(&self, path: &str, params: &[(&str, &str)]) -> Call<String> {
        self.call(
            Self::spec(Method::Get, path, Encoding::Query(pairs(params))),
            decode::raw(),
        )
    }

    pub fn post(&self, path: &str, fields: &[(&str, &str)]) -> Call<String> {
        self.call(
            Self::spec(Method::Post, path, Encoding::Form(pairs(fields))),
            decode::raw(),
        )
    }

    pub fn form<S: Serialize + ?Sized>(&self, path: &str, fields: &S) -> Call<String> {
        let spec = form_fields(fields).map(|f| RequestSpec::new(Method::Post, path, Encoding::Form(f)));
        self.call(spec, decode::raw())
    }

    pub fn body<S: Serialize + ?Sized>(&self, path: &str, body: &S) -> Call<String> {
        let spec = json_body(body).map(|v| RequestSpec::new(Method::Post, path, Encoding::Body(v)));
        self.call(spec, decode::raw())
    }

    pub fn json(&self, path: &str, json: impl Into<String>) -> Call<String> {
        self.call(
            Self::spec(Method::Post, path, Encoding::Json(json.into())),
            decode::raw(),
        )
    }

    // Downloads.

    /// Stream `url` (absolute, or relative to the base URL) to disk.
    ///
    /// A second request for a URL that is still in flight returns a handle
    /// to the same transfer. The joining caller's `target` is ignored: the
    /// file lands where the first caller asked and only the first progress
    /// callback fires.
    pub fn download(&self, url: &str, target: DownloadTarget) -> Result<DownloadHandle> {
        self.start_download(url, target, DownloadKind::Streamed)
    }

    /// Like [`NetWorker::download`], reading the body into memory first.
    pub fn download_small(&self, url: &str, target: DownloadTarget) -> Result<DownloadHandle> {
        self.start_download(url, target, DownloadKind::Buffered)
    }

    /// Stream to disk and deliver the outcome on the io pool.
    pub fn download_with<F>(&self, url: &str, target: DownloadTarget, callback: F) -> Result<DownloadHandle>
    where
        F: FnOnce(Result<PathBuf>) + Send + 'static,
    {
        let handle = self.download(url, target)?;
        let waiter = handle.clone();
        self.inner
            .dispatcher
            .io()
            .spawn(async move { callback(waiter.wait().await) });
        Ok(handle)
    }

    fn start_download(&self, url: &str, target: DownloadTarget, kind: DownloadKind) -> Result<DownloadHandle> {
        let resolved = RequestParts::resolve(
            &self.inner.base_url,
            &RequestSpec::new(Method::Get, url, Encoding::Empty),
        )?
        .url;
        let key = resolved.to_string();

        let (handle, status) = match self.inner.downloads.begin(&key) {
            Registration::Joined(handle) => {
                debug!(url = %key, id = handle.id(), dir = %target.dir.display(), "joined download keeps the first target");
                return Ok(handle);
            }
            Registration::Fresh(handle, status) => (handle, status),
        };

        let worker = self.clone();
        let token = handle.token().clone();
        let id = handle.id();
        self.inner.dispatcher.io().spawn(async move {
            let inner = &worker.inner;
            let mut parts = request_for(resolved);
            let result = match inner.pipeline.prepare(&mut parts).await {
                Ok(()) => transfer::run(&inner.transport, &parts, &target, kind, id, &token, &status).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(path) => {
                    status.send_replace(DownloadStatus::Completed(path));
                }
                Err(Error::Cancelled) => {
                    status.send_replace(DownloadStatus::Cancelled);
                    inner.downloads.forget(&key, id);
                }
                Err(e) => {
                    debug!(url = %key, error = %e, "download failed");
                    status.send_replace(DownloadStatus::Failed(e));
                }
            }
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Comment<'a> {
        story: u64,
        text: &'a str,
        anonymous: bool,
        reply_to: Option<u64>,
    }

    #[test]
    fn objects_flatten_into_form_fields() {
        let fields = form_fields(&Comment {
            story: 9,
            text: "nice",
            anonymous: false,
            reply_to: None,
        })
        .unwrap();
        assert!(fields.contains(&("story".into(), "9".into())));
        assert!(fields.contains(&("text".into(), "nice".into())));
        assert!(fields.contains(&("anonymous".into(), "false".into())));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn non_objects_cannot_be_form_encoded() {
        let err = form_fields(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidRequest);
    }

    #[test]
    fn verbs_pick_the_documented_encoding() {
        let worker = NetWorker::builder()
            .base_url("https://api.example.com/")
            .cache(false)
            .io_threads(1)
            .build()
            .unwrap();
        let get = worker.execute_get::<serde_json::Value>("news/1", &[("a", "1")]);
        assert_eq!(get.spec().unwrap().method, Method::Get);
        assert!(matches!(get.spec().unwrap().encoding, Encoding::Query(_)));

        let put = worker.execute_put::<serde_json::Value>("news/1", &[("a", "1")]);
        assert!(matches!(put.spec().unwrap().encoding, Encoding::Form(_)));

        let json = worker.json("news", r#"{"a":1}"#);
        assert_eq!(json.spec().unwrap().encoding, Encoding::Json(r#"{"a":1}"#.into()));

        let bad = worker.form("news", &"not an object");
        assert!(bad.spec().is_none());
    }
}
