//! Mutual TLS for secret discovery connections.
//!
//! Streams only ever speak TLS 1.3. The handshake is done here rather than
//! by tonic so the protocol version and ALPN are pinned in one place.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tonic::codegen::Service;
use tonic::transport::Uri;

use crate::errors::SdsError;

pub(crate) const PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

const ALPN_H2: &[u8] = b"h2";

/// Build the client side config from PEM encoded CA bundle, client chain
/// and client key. Paths are only used for error reporting.
pub(crate) fn client_config(
    ca: (&Path, &[u8]),
    certificate: (&Path, &[u8]),
    key: (&Path, &[u8]),
) -> Result<ClientConfig, SdsError> {
    let mut roots = RootCertStore::empty();
    let (added, _) = roots.add_parsable_certificates(load_certs(ca.0, ca.1)?);
    if added == 0 {
        return Err(invalid(ca.0, "no usable CA certificate"));
    }

    let chain = load_certs(certificate.0, certificate.1)?;
    let private_key = load_key(key.0, key.1)?;

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, private_key)?;
    config.alpn_protocols = vec![ALPN_H2.to_vec()];
    Ok(config)
}

fn load_certs(path: &Path, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, SdsError> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(path, e.to_string()))?;
    if certs.is_empty() {
        return Err(invalid(path, "no certificate found"));
    }
    Ok(certs)
}

fn load_key(path: &Path, pem: &[u8]) -> Result<PrivateKeyDer<'static>, SdsError> {
    rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| invalid(path, e.to_string()))?
        .ok_or_else(|| invalid(path, "no private key found"))
}

fn invalid(path: &Path, reason: impl Into<String>) -> SdsError {
    SdsError::InvalidCredentials {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Connector handed to tonic: plain TCP to the endpoint, then a rustls
/// handshake verified against `server_name`.
#[derive(Clone)]
pub(crate) struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    server_name: ServerName<'static>,
}

impl TlsConnector {
    pub(crate) fn new(config: ClientConfig, host: &str) -> Result<Self, SdsError> {
        let server_name = ServerName::try_from(unbracket(host).to_string())
            .map_err(|_| SdsError::InvalidAddress(host.to_string()))?;
        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }

    async fn connect(&self, uri: Uri) -> io::Result<TlsStream<TcpStream>> {
        let host = uri
            .host()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "endpoint has no host"))?;
        let port = uri
            .port_u16()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "endpoint has no port"))?;
        let tcp = TcpStream::connect((unbracket(host), port)).await?;
        tcp.set_nodelay(true)?;
        self.inner.connect(self.server_name.clone(), tcp).await
    }
}

impl Service<Uri> for TlsConnector {
    type Response = TokioIo<TlsStream<TcpStream>>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();
        Box::pin(async move { connector.connect(uri).await.map(TokioIo::new) })
    }
}

fn unbracket(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rustls::ServerConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    pub(crate) const CA_CERT: &str = include_str!("../../testdata/ca.pem");
    pub(crate) const CLIENT_CERT: &str = include_str!("../../testdata/client.pem");
    pub(crate) const CLIENT_KEY: &str = include_str!("../../testdata/client.key");
    const SERVER_CERT: &str = include_str!("../../testdata/server.pem");
    const SERVER_KEY: &str = include_str!("../../testdata/server.key");

    fn config() -> Result<ClientConfig, SdsError> {
        client_config(
            (Path::new("ca.pem"), CA_CERT.as_bytes()),
            (Path::new("client.pem"), CLIENT_CERT.as_bytes()),
            (Path::new("client.key"), CLIENT_KEY.as_bytes()),
        )
    }

    fn server_config(versions: &[&'static SupportedProtocolVersion]) -> Arc<ServerConfig> {
        let chain = rustls_pemfile::certs(&mut SERVER_CERT.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let key = rustls_pemfile::private_key(&mut SERVER_KEY.as_bytes())
            .unwrap()
            .unwrap();
        let config =
            ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_protocol_versions(versions)
                .unwrap()
                .with_no_client_auth()
                .with_single_cert(chain, key)
                .unwrap();
        Arc::new(config)
    }

    /// Accept one connection with the given versions and report what the
    /// client ended up negotiating.
    async fn handshake(
        versions: &[&'static SupportedProtocolVersion],
    ) -> io::Result<Option<rustls::ProtocolVersion>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let acceptor = TlsAcceptor::from(server_config(versions));
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await?;
            let mut tls = acceptor.accept(tcp).await?;
            let mut buf = [0u8; 4];
            tls.read_exact(&mut buf).await?;
            io::Result::Ok(buf)
        });

        let mut connector = TlsConnector::new(config().unwrap(), "localhost").unwrap();
        let uri: Uri = format!("http://{addr}").parse().unwrap();
        let mut stream = connector.call(uri).await?.into_inner();
        stream.write_all(b"ping").await?;
        let version = stream.get_ref().1.protocol_version();
        assert_eq!(&server.await.unwrap()?, b"ping");
        Ok(version)
    }

    #[test]
    fn test_only_tls13_is_offered() {
        assert_eq!(PROTOCOL_VERSIONS.len(), 1);
        assert_eq!(PROTOCOL_VERSIONS[0].version, rustls::ProtocolVersion::TLSv1_3);

        let config = config().unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[tokio::test]
    async fn test_handshake_negotiates_tls13() {
        let version = handshake(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .await
            .unwrap();
        assert_eq!(version, Some(rustls::ProtocolVersion::TLSv1_3));
    }

    #[tokio::test]
    async fn test_tls12_only_server_is_rejected() {
        assert!(handshake(&[&rustls::version::TLS12]).await.is_err());
    }

    #[test]
    fn test_empty_ca_bundle_is_rejected() {
        let err = client_config(
            (Path::new("ca.pem"), b""),
            (Path::new("client.pem"), CLIENT_CERT.as_bytes()),
            (Path::new("client.key"), CLIENT_KEY.as_bytes()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SdsError::InvalidCredentials { ref path, .. } if path == Path::new("ca.pem")
        ));
    }

    #[test]
    fn test_missing_private_key_is_rejected() {
        let err = client_config(
            (Path::new("ca.pem"), CA_CERT.as_bytes()),
            (Path::new("client.pem"), CLIENT_CERT.as_bytes()),
            (Path::new("client.key"), CLIENT_CERT.as_bytes()),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SdsError::InvalidCredentials { ref path, .. } if path == Path::new("client.key")
        ));
    }

    #[test]
    fn test_bracketed_ipv6_host() {
        assert_eq!(unbracket("[::1]"), "::1");
        assert!(TlsConnector::new(config().unwrap(), "[::1]").is_ok());
    }
}
