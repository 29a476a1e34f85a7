//! certdx client.
//!
//! Keeps a set of locally stored TLS certificates in sync with certdx
//! servers. Two transports are supported:
//!
//! - **http**: one polling [watchdog](polling::HttpServers::watchdog) per
//!   certificate, with main/standby fallback per request cycle.
//! - **grpc**: a secret discovery stream ([`sds::SdsClient`]) carrying every
//!   certificate, driven by a [`failover::FailoverLoop`] that brings up the
//!   standby server when main is unreachable and drops it again as soon as
//!   main responds.
//!
//! Either way new material lands in a [`WatchedCert`], which persists it and
//! runs the configured reload command when it actually changed.

mod errors;

pub mod daemon;
pub mod failover;
pub mod handlers;
pub mod http;
pub mod polling;
pub mod sds;
pub mod signals;
pub mod storage;
pub mod watch;

pub use daemon::Daemon;
pub use errors::{ClientError, SdsError, StorageError};
pub use failover::{FailoverLoop, FailoverSettings, Role, StreamSource};
pub use handlers::WriteCertAndRunCommand;
pub use http::HttpCertClient;
pub use polling::HttpServers;
pub use sds::SdsClient;
pub use watch::{CertMaterial, CertUpdateHandler, WatchedCert};
