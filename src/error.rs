//! Error types shared by the server and the client.

use std::io;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while parsing a wire message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid start line: {reason}")]
    StartLine { reason: String },

    #[error("invalid or missing content-length: {reason}")]
    ContentLength { reason: String },

    #[error("message head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to resolve host {host}: {source}")]
    HostResolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {host}: {source}")]
    EndpointConnect {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("socket read error: {source}")]
    SocketRead {
        #[source]
        source: io::Error,
    },

    #[error("socket write error: {source}")]
    SocketWrite {
        #[source]
        source: io::Error,
    },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    RoutePattern { pattern: String, reason: String },

    #[error("tls error: {reason}")]
    Tls { reason: String },

    #[error("failed to decompress body: {source}")]
    Decompress {
        #[source]
        source: io::Error,
    },

    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid url: {source}")]
    InvalidUrl {
        #[from]
        source: url::ParseError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("request cancelled before completion")]
    Cancelled,
}

impl Error {
    pub(crate) fn read(source: io::Error) -> Self {
        Error::SocketRead { source }
    }

    pub(crate) fn write(source: io::Error) -> Self {
        Error::SocketWrite { source }
    }

    pub(crate) fn tls(reason: impl Into<String>) -> Self {
        Error::Tls {
            reason: reason.into(),
        }
    }

    /// Whether the operation failed because a deadline expired rather than
    /// because the peer was unreachable or misbehaved.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Whether the socket itself failed, as opposed to the peer sending
    /// something unparseable or a deadline expiring. weft never retries
    /// these; callers that want to can key off this.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Error::SocketRead { .. } | Error::SocketWrite { .. })
    }
}
