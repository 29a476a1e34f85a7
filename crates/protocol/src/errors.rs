//! Protocol error types.

use thiserror::Error;

/// Malformed or unexpected protocol payloads.
///
/// Every variant is fatal to the stream that produced it.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("response carries {0} resources, expected exactly one")]
    UnexpectedResourceCount(usize),

    #[error("unexpected resource type: {0}")]
    UnexpectedTypeUrl(String),

    #[error("can not unmarshal message from server: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("secret {0} is not a TLS certificate")]
    UnexpectedSecretType(String),

    #[error("secret {name} has no inline {field}")]
    MissingInlineData { name: String, field: &'static str },

    #[error("unexpected cert: {0}")]
    UnknownResource(String),
}
