//! Client error types.

use std::path::PathBuf;

use certdx_protocol::ProtocolError;
use thiserror::Error;

/// Polling transport failures. All of them are eligible for retry.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Reasons a secret discovery stream ended.
#[derive(Error, Debug)]
pub enum SdsError {
    /// Stopped on purpose by its owner. Never retried.
    #[error("stream killed")]
    Killed,

    #[error("failed to load TLS material {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS material {path}: {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },

    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid server address {0}")]
    InvalidAddress(String),

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("stream failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("stream closed by server")]
    Closed,
}

impl SdsError {
    pub fn is_killed(&self) -> bool {
        matches!(self, SdsError::Killed)
    }
}

/// Certificate persistence failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
