//! Wire protocols spoken by the certdx client.
//!
//! - [`sds`]: the secret discovery service stream (Envoy SDS v3 over gRPC),
//!   used in streaming mode. Message definitions mirror the upstream Envoy
//!   protobufs field for field so the client interoperates with any SDS
//!   server that serves TLS certificate secrets.
//! - [`polling`]: the JSON request/response pair used in polling mode.

mod errors;
pub mod polling;
pub mod sds;

pub use errors::ProtocolError;
pub use polling::{CertRequest, CertResponse};
