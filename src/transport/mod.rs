//! HTTP transport: request description and the configured `reqwest` client.

pub mod http;
pub mod request;

pub use http::{CookiePolicy, Fetched, HttpTransport};
pub use request::{Encoding, Method, MultipartField, RequestParts, RequestSpec};
