//! Error classification kinds.
//!
//! Every failure that crosses the transport/parse boundary is mapped onto
//! exactly one [`ErrorKind`]. Call sites that only want to render a message
//! can switch on the kind instead of matching the full [`crate::Error`].
//!
//! | Kind | Origin |
//! |------|--------|
//! | `NetworkUnreachable` | DNS, connect or TLS failure, connection reset |
//! | `Timeout` | connect/read/write deadline exceeded |
//! | `MalformedResponse` | body not parseable, envelope without payload |
//! | `HttpStatus` | non-success transport status |
//! | `BusinessRejected` | well-formed envelope whose code fails the success policy |
//! | `Cancelled` | call cancelled through its token, tag or download registry |
//! | `InvalidRequest` | request body or multipart part could not be encoded |
//! | `Configuration` | client could not be built |
//! | `Unknown` | anything else |

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkUnreachable,
    Timeout,
    MalformedResponse,
    HttpStatus,
    BusinessRejected,
    Cancelled,
    InvalidRequest,
    Configuration,
    Unknown,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        Self::NetworkUnreachable,
        Self::Timeout,
        Self::MalformedResponse,
        Self::HttpStatus,
        Self::BusinessRejected,
        Self::Cancelled,
        Self::InvalidRequest,
        Self::Configuration,
        Self::Unknown,
    ];

    /// Returns the canonical name (e.g., `"network_unreachable"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "network_unreachable",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::HttpStatus => "http_status",
            Self::BusinessRejected => "business_rejected",
            Self::Cancelled => "cancelled",
            Self::InvalidRequest => "invalid_request",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }

    /// Maps an I/O error kind to the closest classification.
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Self {
        use std::io::ErrorKind as Io;
        match kind {
            Io::TimedOut => Self::Timeout,
            Io::ConnectionRefused
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::NotConnected
            | Io::AddrNotAvailable
            | Io::BrokenPipe => Self::NetworkUnreachable,
            Io::InvalidData | Io::UnexpectedEof => Self::MalformedResponse,
            Io::Interrupted => Self::Cancelled,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = ErrorKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
    }
}
