//! Server endpoint validation
//!
//! Checks that the selected mode has a main server and that the TLS material
//! needed for the discovery stream is present.

use super::{ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
use crate::{ClientConfig, GrpcServerConfig, Mode};
use crate::{AuthMethod, HttpServerConfig};

/// Validate the servers of the selected mode
pub fn validate_servers(config: &ClientConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    match config.server.mode {
        Mode::Http => {
            if config.http.main_server.url.is_empty() {
                result.add_error(ValidationError::new(
                    ErrorCategory::Server,
                    "Main server url should not be empty",
                ));
            } else {
                check_http_server("MainServer", &config.http.main_server, &mut result);
            }
            if let Some(standby) = config.http.standby() {
                check_http_server("StandbyServer", standby, &mut result);
            }
        }
        Mode::Grpc => {
            if config.grpc.main_server.server.is_empty() {
                result.add_error(ValidationError::new(
                    ErrorCategory::Server,
                    "Main server address should not be empty",
                ));
            } else {
                check_grpc_server("MainServer", &config.grpc.main_server, &mut result);
            }
            if let Some(standby) = config.grpc.standby() {
                check_grpc_server("StandbyServer", standby, &mut result);
            }
        }
    }

    if config.server.retry_count == 0 {
        result.add_warning(ValidationWarning::new(
            "retryCount is 0: every failure moves straight to the standby server or the reconnect interval",
        ));
    }

    result
}

fn check_http_server(role: &str, server: &HttpServerConfig, result: &mut ValidationResult) {
    if !(server.url.starts_with("http://") || server.url.starts_with("https://")) {
        result.add_error(ValidationError::new(
            ErrorCategory::Server,
            format!("{} url '{}' must start with http:// or https://", role, server.url),
        ));
    }
    if server.auth_method == AuthMethod::Token && server.token.is_empty() {
        result.add_error(ValidationError::new(
            ErrorCategory::Server,
            format!("{} uses token authentication but no token is set", role),
        ));
    }
}

fn check_grpc_server(role: &str, server: &GrpcServerConfig, result: &mut ValidationResult) {
    for (field, path) in [
        ("ca", &server.ca),
        ("certificate", &server.certificate),
        ("key", &server.key),
    ] {
        if path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                ErrorCategory::Server,
                format!("{} {} should not be empty", role, field),
            ));
        } else if !path.exists() {
            result.add_error(ValidationError::new(
                ErrorCategory::Server,
                format!("{} {} not found: {:?}", role, field, path),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config(url: &str) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.http.main_server.url = url.to_string();
        config
    }

    #[test]
    fn test_http_main_server_required() {
        let result = validate_servers(&http_config(""));
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("Main server url should not be empty")));
    }

    #[test]
    fn test_http_url_scheme() {
        let result = validate_servers(&http_config("ftp://certs.example.com"));
        assert_eq!(result.errors.len(), 1);

        let result = validate_servers(&http_config("https://certs.example.com"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_token_auth_requires_token() {
        let mut config = http_config("https://certs.example.com");
        config.http.main_server.auth_method = AuthMethod::Token;
        let result = validate_servers(&config);
        assert!(result.errors.iter().any(|e| e.message.contains("no token")));
    }

    #[test]
    fn test_grpc_requires_tls_material() {
        let mut config = ClientConfig::default();
        config.server.mode = Mode::Grpc;
        config.grpc.main_server.server = "certs.example.com:10001".to_string();
        config.grpc.main_server.ca = "/nonexistent/ca.pem".into();

        let result = validate_servers(&config);
        assert!(result.errors.iter().any(|e| e.message.contains("ca not found")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("certificate should not be empty")));
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("key should not be empty")));
    }

    #[test]
    fn test_grpc_with_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut server = GrpcServerConfig {
            server: "certs.example.com:10001".to_string(),
            ..Default::default()
        };
        for (name, slot) in [
            ("ca.pem", &mut server.ca),
            ("client.pem", &mut server.certificate),
            ("client.key", &mut server.key),
        ] {
            let path = dir.path().join(name);
            std::fs::write(&path, "pem").unwrap();
            *slot = path;
        }

        let mut config = ClientConfig::default();
        config.server.mode = Mode::Grpc;
        config.grpc.main_server = server;

        assert!(validate_servers(&config).is_ok());
    }

    #[test]
    fn test_zero_retry_count_warns() {
        let mut config = http_config("https://certs.example.com");
        config.server.retry_count = 0;
        let result = validate_servers(&config);
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }
}
