use crate::error_kind::ErrorKind;
use thiserror::Error;

/// Structured error context for configuration and request-building failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key or request field that caused the error (e.g., "base_url", "tls.certificates[0]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., the rejected value)
    pub details: Option<String>,
    /// Component that raised the error (e.g., "builder", "transport")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for every call made through a [`crate::NetWorker`].
///
/// Transport, parse and business failures are all folded into this one enum
/// before they reach the caller; [`Error::kind`] gives the classification.
/// The type is `Clone` so a single outcome can be shared by every waiter of
/// a download.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid request: {message}{}", format_context(.context))]
    InvalidRequest {
        message: String,
        context: ErrorContext,
    },

    #[error("Network unreachable: {message}")]
    NetworkUnreachable { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rejected by server: code {code}{}", format_message(.message))]
    BusinessRejected { code: i64, message: Option<String> },

    #[error("Call cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {}", m),
        _ => String::new(),
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_request_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Error::Unknown {
            message: msg.into(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Error::NetworkUnreachable { .. } => ErrorKind::NetworkUnreachable,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Error::HttpStatus { .. } => ErrorKind::HttpStatus,
            Error::BusinessRejected { .. } => ErrorKind::BusinessRejected,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io { kind, .. } => ErrorKind::from_io_kind(*kind),
            Error::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::InvalidRequest { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether a cached response may stand in for this failure.
    pub(crate) fn is_remote_unavailable(&self) -> bool {
        match self {
            Error::HttpStatus { status, .. } => *status >= 500,
            other => matches!(
                other.kind(),
                ErrorKind::NetworkUnreachable | ErrorKind::Timeout
            ),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedResponse {
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        crate::client::error_classification::from_reqwest(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_renders_context() {
        let err = Error::configuration_with_context(
            "base URL required",
            ErrorContext::new()
                .with_field_path("base_url")
                .with_source("builder"),
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: base URL required (field: base_url, source: builder)"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn business_rejection_keeps_code_and_message() {
        let err = Error::BusinessRejected {
            code: 40001,
            message: Some("not found".into()),
        };
        assert_eq!(err.to_string(), "Rejected by server: code 40001: not found");
        assert_eq!(err.kind(), ErrorKind::BusinessRejected);
    }

    #[test]
    fn io_errors_are_classified_by_io_kind() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused").into();
        assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
        let err: Error = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn only_server_side_failures_allow_cache_fallback() {
        assert!(Error::HttpStatus { status: 503, body: String::new() }.is_remote_unavailable());
        assert!(!Error::HttpStatus { status: 404, body: String::new() }.is_remote_unavailable());
        assert!(Error::Timeout { message: String::new() }.is_remote_unavailable());
        assert!(!Error::malformed("bad").is_remote_unavailable());
    }
}
