//! Error classification logic

use crate::error_kind::ErrorKind;
use crate::{Error, ErrorContext};

/// Map a `reqwest` failure onto the crate error.
///
/// Order matters: a timed-out connect reports both `is_timeout` and
/// `is_connect`, and the deadline is the more useful answer. A body cut off
/// mid-transfer is a network failure; only an unparseable one is malformed.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    let message = e.to_string();
    if e.is_timeout() {
        Error::Timeout { message }
    } else if e.is_connect() || e.is_request() || e.is_body() {
        Error::NetworkUnreachable { message }
    } else if e.is_builder() {
        Error::invalid_request_with_context(
            message,
            ErrorContext::new().with_source("transport"),
        )
    } else if e.is_decode() {
        Error::MalformedResponse { message }
    } else if let Some(status) = e.status() {
        Error::HttpStatus {
            status: status.as_u16(),
            body: message,
        }
    } else {
        Error::Unknown { message }
    }
}

/// Classify any error by its origin. Total: unrecognized errors are `Unknown`.
///
/// The source chain is walked, so an I/O error wrapped by another library
/// is still recognized.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(kind) = classify_one(e) {
            return kind;
        }
        current = e.source();
    }
    ErrorKind::Unknown
}

fn classify_one(e: &(dyn std::error::Error + 'static)) -> Option<ErrorKind> {
    if let Some(e) = e.downcast_ref::<Error>() {
        return Some(e.kind());
    }
    if let Some(e) = e.downcast_ref::<reqwest::Error>() {
        // Fall through to the source when reqwest has no opinion.
        let kind = classify_reqwest(e);
        return (kind != ErrorKind::Unknown).then_some(kind);
    }
    if let Some(e) = e.downcast_ref::<std::io::Error>() {
        let kind = ErrorKind::from_io_kind(e.kind());
        return (kind != ErrorKind::Unknown).then_some(kind);
    }
    if e.downcast_ref::<serde_json::Error>().is_some() {
        return Some(ErrorKind::MalformedResponse);
    }
    if e.downcast_ref::<serde_yaml::Error>().is_some() {
        return Some(ErrorKind::Configuration);
    }
    if e.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return Some(ErrorKind::Timeout);
    }
    if e.downcast_ref::<url::ParseError>().is_some() {
        return Some(ErrorKind::InvalidRequest);
    }
    None
}

fn classify_reqwest(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        ErrorKind::NetworkUnreachable
    } else if e.is_builder() {
        ErrorKind::InvalidRequest
    } else if e.is_decode() {
        ErrorKind::MalformedResponse
    } else if e.is_status() {
        ErrorKind::HttpStatus
    } else {
        ErrorKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapper(std::io::Error);

    impl fmt::Display for Wrapper {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "wrapped")
        }
    }

    impl std::error::Error for Wrapper {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[derive(Debug)]
    struct Opaque;

    impl fmt::Display for Opaque {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "opaque")
        }
    }

    impl std::error::Error for Opaque {}

    #[test]
    fn crate_errors_keep_their_kind() {
        let err = Error::BusinessRejected {
            code: 40001,
            message: None,
        };
        assert_eq!(classify(&err), ErrorKind::BusinessRejected);
        assert_eq!(classify(&Error::Cancelled), ErrorKind::Cancelled);
    }

    #[test]
    fn parse_errors_are_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::MalformedResponse);
    }

    #[test]
    fn io_errors_are_found_through_the_source_chain() {
        let err = Wrapper(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(classify(&err), ErrorKind::NetworkUnreachable);
    }

    #[test]
    fn unrecognized_errors_are_unknown() {
        assert_eq!(classify(&Opaque), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn elapsed_timers_are_timeouts() {
        let err = tokio::time::timeout(std::time::Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::Timeout);
    }

    #[test]
    fn url_parse_errors_are_invalid_requests() {
        let err = url::Url::parse("not a url").unwrap_err();
        assert_eq!(classify(&err), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn refused_connections_are_unreachable() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = reqwest::get(format!("http://127.0.0.1:{}/", port))
            .await
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NetworkUnreachable);
        assert_eq!(Error::from(err).kind(), ErrorKind::NetworkUnreachable);
    }

    #[tokio::test]
    async fn truncated_bodies_are_unreachable() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n{\"code\":0,\"d")
                .await;
        });

        let resp = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        let err = resp.bytes().await.unwrap_err();
        assert_eq!(classify(&err), ErrorKind::NetworkUnreachable);
        let err = Error::from(err);
        assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
        assert!(err.is_remote_unavailable());
    }
}
