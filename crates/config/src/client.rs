//! Client configuration schema.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::duration::serde_str;
use crate::validate::{self, ValidationResult};
use crate::ConfigError;

/// Root configuration of the certdx client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Operating mode and retry policy.
    #[serde(rename = "Server", default)]
    pub server: ServerConfig,

    /// Servers used in polling mode.
    #[serde(rename = "Http", default)]
    pub http: HttpConfig,

    /// Servers used in streaming mode.
    #[serde(rename = "GRPC", default)]
    pub grpc: GrpcConfig,

    /// Certificates to keep in sync.
    #[serde(rename = "Certifications", default)]
    pub certifications: Vec<CertificationConfig>,
}

impl ClientConfig {
    /// Load a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        trace!(path = %path.display(), "Reading configuration file");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&content)?;
        debug!(
            path = %path.display(),
            mode = %config.server.mode,
            certifications = config.certifications.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration.
    ///
    /// Returns the warnings on success, or every validation error at once.
    pub fn validate(&self) -> Result<ValidationResult, ConfigError> {
        let mut result = validate::validate_servers(self);
        result.merge(validate::validate_certifications(self));

        if result.errors.is_empty() {
            Ok(result)
        } else {
            Err(ConfigError::Invalid(result.errors))
        }
    }
}

/// Transport used to obtain certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Poll an HTTP endpoint per certificate.
    #[default]
    Http,
    /// Keep a secret discovery stream open.
    Grpc,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Http => write!(f, "http"),
            Mode::Grpc => write!(f, "grpc"),
        }
    }
}

/// `[Server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: Mode,

    /// Retries after the first failed attempt, per server.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Wait before reconnecting once the retry budget is exhausted.
    #[serde(default = "default_reconnect_interval", with = "serde_str")]
    pub reconnect_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            retry_count: default_retry_count(),
            reconnect_interval: default_reconnect_interval(),
        }
    }
}

fn default_retry_count() -> u32 {
    5
}

fn default_reconnect_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

/// `[Http]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "MainServer", default)]
    pub main_server: HttpServerConfig,

    /// An empty `url` means no standby server.
    #[serde(rename = "StandbyServer", default)]
    pub standby_server: HttpServerConfig,
}

impl HttpConfig {
    /// The standby server, if one is configured.
    pub fn standby(&self) -> Option<&HttpServerConfig> {
        (!self.standby_server.url.is_empty()).then_some(&self.standby_server)
    }
}

/// Authentication used against a polling server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
    /// `Authorization: Token <token>`
    Token,
}

/// A polling server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpServerConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub auth_method: AuthMethod,

    #[serde(default)]
    pub token: String,

    /// Per-request timeout.
    #[serde(default = "default_http_timeout", with = "serde_str")]
    pub timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_method: AuthMethod::default(),
            token: String::new(),
            timeout: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

/// `[GRPC]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrpcConfig {
    #[serde(rename = "MainServer", default)]
    pub main_server: GrpcServerConfig,

    /// An empty `server` means no standby server.
    #[serde(rename = "StandbyServer", default)]
    pub standby_server: GrpcServerConfig,
}

impl GrpcConfig {
    /// The standby server, if one is configured.
    pub fn standby(&self) -> Option<&GrpcServerConfig> {
        (!self.standby_server.server.is_empty()).then_some(&self.standby_server)
    }
}

/// A secret discovery server reached over mutual TLS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcServerConfig {
    /// `host:port` of the server.
    #[serde(default)]
    pub server: String,

    /// CA bundle used to verify the server certificate.
    #[serde(default)]
    pub ca: PathBuf,

    /// Client certificate presented to the server.
    #[serde(default)]
    pub certificate: PathBuf,

    /// Private key of the client certificate.
    #[serde(default)]
    pub key: PathBuf,
}

/// One certificate kept in sync by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationConfig {
    /// Unique identifier, also the discovery resource name.
    pub name: String,

    /// Directory the chain and key are written to.
    pub save_path: PathBuf,

    /// Domains covered by the certificate, in the order sent to the server.
    pub domains: Vec<String>,

    /// Shell command run after a new certificate has been written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_command: Option<String>,
}

impl CertificationConfig {
    /// Path of the persisted certificate chain.
    pub fn fullchain_path(&self) -> PathBuf {
        self.save_path.join(format!("{}.pem", self.name))
    }

    /// Path of the persisted private key.
    pub fn key_path(&self) -> PathBuf {
        self.save_path.join(format!("{}.key", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
[Server]
mode = "grpc"
retryCount = 2
reconnectInterval = "1h30m"

[Http.MainServer]
url = "https://main.example.com/"
authMethod = "token"
token = "secret"
timeout = "10s"

[Http.StandbyServer]
url = "https://standby.example.com/"

[GRPC.MainServer]
server = "main.example.com:10001"
ca = "/etc/certdx/ca.pem"
certificate = "/etc/certdx/client.pem"
key = "/etc/certdx/client.key"

[[Certifications]]
name = "example"
savePath = "/etc/ssl/example"
domains = ["example.com", "*.example.com"]
reloadCommand = "systemctl reload nginx"

[[Certifications]]
name = "other"
savePath = "/etc/ssl/other"
domains = ["other.org"]
"#;

    #[test]
    fn test_parse_full_config() {
        let config = ClientConfig::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.server.mode, Mode::Grpc);
        assert_eq!(config.server.retry_count, 2);
        assert_eq!(config.server.reconnect_interval, Duration::from_secs(5400));

        assert_eq!(config.http.main_server.url, "https://main.example.com/");
        assert_eq!(config.http.main_server.auth_method, AuthMethod::Token);
        assert_eq!(config.http.main_server.timeout, Duration::from_secs(10));
        assert_eq!(
            config.http.standby().map(|s| s.url.as_str()),
            Some("https://standby.example.com/")
        );

        assert_eq!(config.grpc.main_server.server, "main.example.com:10001");
        assert!(config.grpc.standby().is_none());

        assert_eq!(config.certifications.len(), 2);
        let cert = &config.certifications[0];
        assert_eq!(cert.domains, vec!["example.com", "*.example.com"]);
        assert_eq!(cert.reload_command.as_deref(), Some("systemctl reload nginx"));
        assert_eq!(config.certifications[1].reload_command, None);
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
[Http.MainServer]
url = "https://main.example.com/"
"#,
        )
        .unwrap();

        assert_eq!(config.server.mode, Mode::Http);
        assert_eq!(config.server.retry_count, 5);
        assert_eq!(config.server.reconnect_interval, Duration::from_secs(600));
        assert_eq!(config.http.main_server.auth_method, AuthMethod::None);
        assert_eq!(config.http.main_server.timeout, Duration::from_secs(30));
        assert!(config.http.standby().is_none());
        assert!(config.certifications.is_empty());
    }

    #[test]
    fn test_unsupported_mode_is_rejected() {
        let err = ClientConfig::from_toml_str("[Server]\nmode = \"carrier-pigeon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let err = ClientConfig::from_toml_str("[Server]\nreconnectInterval = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_cert_paths() {
        let cert = CertificationConfig {
            name: "example".to_string(),
            save_path: PathBuf::from("/etc/ssl/example"),
            domains: vec!["example.com".to_string()],
            reload_command: None,
        };
        assert_eq!(cert.fullchain_path(), PathBuf::from("/etc/ssl/example/example.pem"));
        assert_eq!(cert.key_path(), PathBuf::from("/etc/ssl/example/example.key"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, FULL_CONFIG).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.certifications.len(), 2);

        let missing = ClientConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
