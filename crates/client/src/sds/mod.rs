//! Secret discovery stream client.
//!
//! An [`SdsClient`] is bound to one server and the full set of watched
//! certificates. Each call to [`SdsClient::stream`] connects, runs one
//! session until it ends and reports why.

mod session;
mod tls;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use certdx_config::GrpcServerConfig;
use certdx_protocol::sds::SecretDiscoveryServiceClient;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint, Uri};
use tracing::{debug, info};

use crate::errors::SdsError;
use crate::failover::{Role, StreamSource};
use crate::watch::WatchedCert;
use session::Session;
use tls::TlsConnector;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(25);

pub struct SdsClient {
    role: Role,
    server: GrpcServerConfig,
    certs: Vec<Arc<WatchedCert>>,
    kill: Notify,
    received: ArcSwap<CancellationToken>,
}

impl SdsClient {
    pub fn new(role: Role, server: GrpcServerConfig, certs: Vec<Arc<WatchedCert>>) -> Self {
        Self {
            role,
            server,
            certs,
            kill: Notify::new(),
            received: ArcSwap::from_pointee(CancellationToken::new()),
        }
    }

    /// Connect and run one session.
    ///
    /// Always ends with an error: [`SdsError::Killed`] after [`kill`](Self::kill),
    /// anything else when the stream broke.
    pub async fn stream(&self) -> SdsError {
        let killed = self.kill.notified();
        tokio::pin!(killed);
        if killed.as_mut().now_or_never().is_some() {
            return SdsError::Killed;
        }

        info!(role = %self.role, server = %self.server.server, "Connecting to SDS server");
        let channel = tokio::select! {
            biased;
            _ = killed.as_mut() => return SdsError::Killed,
            channel = self.connect() => match channel {
                Ok(channel) => channel,
                Err(e) => return e,
            },
        };

        let (session, requests) = match Session::open(&self.certs) {
            Ok(opened) => opened,
            Err(e) => return e,
        };
        let mut client = SecretDiscoveryServiceClient::new(channel);
        let response = tokio::select! {
            biased;
            _ = killed.as_mut() => return SdsError::Killed,
            response = client.stream_secrets(requests) => match response {
                Ok(response) => response,
                Err(status) => return SdsError::Status(status),
            },
        };

        info!(role = %self.role, certs = self.certs.len(), "SDS stream established");
        let reason = session
            .run(response.into_inner(), &self.received, killed.as_mut())
            .await;
        debug!(role = %self.role, reason = %reason, "SDS stream ended");
        reason
    }

    /// Stop the running session, or the next one if none is running.
    pub fn kill(&self) {
        self.kill.notify_one();
    }

    /// Token cancelled the next time a response arrives.
    pub fn received_signal(&self) -> Arc<CancellationToken> {
        self.received.load_full()
    }

    async fn connect(&self) -> Result<Channel, SdsError> {
        let ca = read_pem(&self.server.ca).await?;
        let cert = read_pem(&self.server.certificate).await?;
        let key = read_pem(&self.server.key).await?;

        let config = tls::client_config(
            (self.server.ca.as_path(), ca.as_slice()),
            (self.server.certificate.as_path(), cert.as_slice()),
            (self.server.key.as_path(), key.as_slice()),
        )?;

        let uri = endpoint_uri(&self.server.server)
            .ok_or_else(|| SdsError::InvalidAddress(self.server.server.clone()))?;
        let endpoint = Endpoint::from_shared(uri.to_string())
            .map_err(|_| SdsError::InvalidAddress(self.server.server.clone()))?
            .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
            .keep_alive_timeout(KEEPALIVE_TIMEOUT)
            .keep_alive_while_idle(true);

        let host = uri.host().unwrap_or_default();
        let connector = TlsConnector::new(config, host)?;
        Ok(endpoint.connect_with_connector(connector).await?)
    }
}

#[async_trait]
impl StreamSource for SdsClient {
    fn role(&self) -> Role {
        self.role
    }

    async fn stream(&self) -> SdsError {
        SdsClient::stream(self).await
    }

    fn kill(&self) {
        SdsClient::kill(self)
    }

    fn received_signal(&self) -> Arc<CancellationToken> {
        SdsClient::received_signal(self)
    }
}

impl std::fmt::Debug for SdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdsClient")
            .field("role", &self.role)
            .field("server", &self.server.server)
            .field("certs", &self.certs.len())
            .finish()
    }
}

async fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, SdsError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| SdsError::Credentials {
            path: path.to_path_buf(),
            source,
        })
}

/// Servers are configured as `host:port`. TLS is layered on by
/// [`TlsConnector`], so tonic itself sees a plain `http` URI.
fn endpoint_uri(server: &str) -> Option<Uri> {
    let authority = server
        .split_once("://")
        .map_or(server, |(_, rest)| rest)
        .trim_end_matches('/');
    let uri: Uri = format!("http://{authority}").parse().ok()?;
    (uri.host().is_some() && uri.port_u16().is_some()).then_some(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn client() -> SdsClient {
        SdsClient::new(
            Role::Main,
            GrpcServerConfig {
                server: "127.0.0.1:1".to_string(),
                ca: PathBuf::from("/nonexistent/ca.pem"),
                certificate: PathBuf::from("/nonexistent/client.pem"),
                key: PathBuf::from("/nonexistent/client.key"),
            },
            vec![],
        )
    }

    #[test]
    fn test_endpoint_uri() {
        let uri = endpoint_uri("certdx.example.com:10001").unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.host(), Some("certdx.example.com"));
        assert_eq!(uri.port_u16(), Some(10001));

        assert_eq!(endpoint_uri("https://h:1").unwrap().port_u16(), Some(1));
        assert!(endpoint_uri("certdx.example.com").is_none());
        assert!(endpoint_uri("not a host:1").is_none());
    }

    #[tokio::test]
    async fn test_kill_before_start_is_honored() {
        let client = client();
        client.kill();
        assert!(client.stream().await.is_killed());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_retryable() {
        let err = client().stream().await;
        assert!(matches!(err, SdsError::Credentials { .. }));
        assert!(!err.is_killed());
    }

    #[tokio::test]
    async fn test_kill_is_consumed_once() {
        let client = client();
        client.kill();
        client.kill();
        assert!(client.stream().await.is_killed());
        assert!(!client.stream().await.is_killed());
    }

    #[tokio::test]
    async fn test_valid_credentials_reach_transport() {
        let dir = tempfile::TempDir::new().unwrap();
        let write = |name: &str, pem: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, pem).unwrap();
            path
        };
        let client = SdsClient::new(
            Role::Standby,
            GrpcServerConfig {
                server: "127.0.0.1:1".to_string(),
                ca: write("ca.pem", tls::tests::CA_CERT),
                certificate: write("client.pem", tls::tests::CLIENT_CERT),
                key: write("client.key", tls::tests::CLIENT_KEY),
            },
            vec![],
        );

        let err = client.stream().await;
        assert!(matches!(err, SdsError::Transport(_)), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_unreadable_key_is_reported_by_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let ca = dir.path().join("ca.pem");
        let cert = dir.path().join("client.pem");
        let key = dir.path().join("client.key");
        std::fs::write(&ca, tls::tests::CA_CERT).unwrap();
        std::fs::write(&cert, tls::tests::CLIENT_CERT).unwrap();
        std::fs::write(&key, "not a key").unwrap();
        let client = SdsClient::new(
            Role::Main,
            GrpcServerConfig {
                server: "127.0.0.1:1".to_string(),
                ca,
                certificate: cert,
                key: key.clone(),
            },
            vec![],
        );

        match client.stream().await {
            SdsError::InvalidCredentials { path, .. } => assert_eq!(path, key),
            other => panic!("unexpected error: {other}"),
        }
    }
}
