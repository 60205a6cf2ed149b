//! # netkit
//!
//! A configurable HTTP client facade for JSON REST services.
//!
//! ## Overview
//!
//! A [`NetWorker`] is built once through [`NetWorkerBuilder`] and then frozen.
//! Each verb method returns a lazy [`Call`]; running it dispatches the
//! request onto a dedicated io pool, applies header/query interceptors,
//! consults the response cache, sends the request, unwraps the server
//! [`Envelope`] and classifies any failure into a single [`Error`].
//!
//! ## Key Features
//!
//! - **Verb surface**: GET/POST/PUT/DELETE/PATCH, form fields, JSON bodies,
//!   raw uploads and multipart file uploads
//! - **Envelope unwrapping**: `{code, message, data}` with a pluggable
//!   [`SuccessPolicy`]
//! - **Delivery**: await the result, or have it delivered on a caller-owned
//!   [`MainLoop`] or on the io pool
//! - **Caching**: size-bounded disk cache with per-call [`CacheMode`]
//! - **Downloads**: per-URL registry with join-in-flight, progress and
//!   cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netkit::NetWorker;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Story {
//!     id: u64,
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> netkit::Result<()> {
//!     let worker = NetWorker::builder()
//!         .base_url("https://api.example.com/v1/")
//!         .header("X-Client", "netkit")
//!         .build()?;
//!
//!     let story: Story = worker
//!         .execute_get("news/12345", &[("lang", "en")])
//!         .execute()
//!         .await?;
//!     println!("{} {}", story.id, story.title);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Builder, client handle, lazy calls and verb surface |
//! | [`transport`] | Request model and the reqwest-backed transport |
//! | [`interceptors`] | Header/query injection and request logging |
//! | [`cache`] | Response cache backends and cache modes |
//! | [`download`] | Download registry and handles |
//! | [`dispatch`] | io pool, main context and tag cancellation |
//! | [`envelope`] | Server envelope and success policy |
//! | [`api`] | Typed daily news endpoints |

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod download;
pub mod envelope;
pub mod error;
pub mod error_kind;
pub mod interceptors;
pub mod transport;

pub use cache::CacheMode;
pub use client::{classify, Call, CallHandle, NetWorker, NetWorkerBuilder};
pub use config::ClientConfig;
pub use dispatch::{Delivery, MainContext, MainLoop};
pub use download::{DownloadHandle, DownloadStatus, DownloadTarget};
pub use envelope::{Envelope, SuccessPolicy};
pub use error::{Error, ErrorContext};
pub use error_kind::ErrorKind;
pub use transport::CookiePolicy;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
