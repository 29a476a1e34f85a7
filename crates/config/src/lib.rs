//! Configuration for the certdx certificate distribution client.
//!
//! The client is configured from a single TOML file:
//!
//! ```toml
//! [Server]
//! mode = "grpc"
//! retryCount = 5
//! reconnectInterval = "10m"
//!
//! [GRPC.MainServer]
//! server = "certdx.example.com:10001"
//! ca = "/etc/certdx/ca.pem"
//! certificate = "/etc/certdx/client.pem"
//! key = "/etc/certdx/client.key"
//!
//! [[Certifications]]
//! name = "example"
//! savePath = "/etc/ssl/example"
//! domains = ["example.com", "*.example.com"]
//! reloadCommand = "systemctl reload nginx"
//! ```
//!
//! Loading only parses; call [`ClientConfig::validate`] before any network
//! activity.

mod client;
pub mod duration;
mod errors;
pub mod validate;

pub use client::{
    AuthMethod, CertificationConfig, ClientConfig, GrpcConfig, GrpcServerConfig, HttpConfig,
    HttpServerConfig, Mode, ServerConfig,
};
pub use errors::ConfigError;
pub use validate::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
