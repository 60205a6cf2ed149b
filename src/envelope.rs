//! Server response envelope and business-level success policy.
//!
//! The remote API wraps every payload as
//! `{ "code": 0, "message": "...", "data": {...} }` (some endpoints use
//! `msg` and/or `result`). Whether an envelope is "ok" is decided by a
//! caller-supplied [`SuccessPolicy`], independent of the HTTP status.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Response envelope carrying a status code, optional message and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(alias = "msg", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(code: i64, data: T) -> Self {
        Self {
            code,
            message: None,
            data: Some(data),
            result: None,
        }
    }

    pub fn rejected(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
            result: None,
        }
    }

    /// Unwrap the payload.
    ///
    /// A code rejected by `policy` fails with [`Error::BusinessRejected`]
    /// carrying the server code and message verbatim. An accepted envelope
    /// without `data` or `result` fails with [`Error::MalformedResponse`].
    /// `data` wins over `result` when both are present.
    pub fn unwrap(self, policy: &SuccessPolicy) -> Result<T> {
        if !policy.accepts(self.code) {
            return Err(Error::BusinessRejected {
                code: self.code,
                message: self.message,
            });
        }
        self.data
            .or(self.result)
            .ok_or_else(|| Error::malformed("envelope carries neither `data` nor `result`"))
    }
}

/// Decode a response body as an envelope and unwrap its payload.
pub fn decode_envelope<T: DeserializeOwned>(body: &[u8], policy: &SuccessPolicy) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    envelope.unwrap(policy)
}

/// Predicate deciding which envelope codes count as success.
#[derive(Clone)]
pub struct SuccessPolicy {
    predicate: Arc<dyn Fn(i64) -> bool + Send + Sync>,
}

impl SuccessPolicy {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(i64) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Accept exactly the listed codes.
    pub fn codes(codes: impl IntoIterator<Item = i64>) -> Self {
        let codes: Vec<i64> = codes.into_iter().collect();
        Self::new(move |code| codes.contains(&code))
    }

    pub fn accepts(&self, code: i64) -> bool {
        (self.predicate)(code)
    }
}

impl Default for SuccessPolicy {
    /// `code == 0`.
    fn default() -> Self {
        Self::new(|code| code == 0)
    }
}

impl fmt::Debug for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuccessPolicy").finish_non_exhaustive()
    }
}
