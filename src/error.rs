//! Error types for ptcgp-fetch
//!
//! Per-target errors never leave the item fetcher: they are turned into an
//! outcome and a stats entry there. Only catalog and setup errors reach the
//! caller.

use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ptcgp-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The catalog request for a series failed (transport, status, or body)
    #[error("catalog request for series '{series}' failed: {source}")]
    Catalog {
        series: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transport-level failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status other than 404
    #[error("HTTP {status} for URL: {url}")]
    Status { status: StatusCode, url: String },

    /// Directory creation, write, rename or removal failed
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid command-line configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Classifies errors as transient (worth another attempt) or permanent
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Request covers a reused connection the server already closed;
            // body covers a reset while the image streams in
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            // A status the server chose to send is an answer, not a transient fault
            Error::Status { .. } => false,
            Error::Filesystem { .. } => false,
            Error::Catalog { .. } | Error::Config(_) => false,
        }
    }
}
