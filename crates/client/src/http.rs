//! Polling transport client.

use certdx_config::{AuthMethod, HttpServerConfig};
use certdx_protocol::{CertRequest, CertResponse};
use reqwest::header::AUTHORIZATION;
use tracing::{debug, trace};

use crate::errors::ClientError;

/// Client for one polling server.
#[derive(Debug, Clone)]
pub struct HttpCertClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpCertClient {
    pub fn new(config: &HttpServerConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let token = match config.auth_method {
            AuthMethod::Token => Some(config.token.clone()),
            AuthMethod::None => None,
        };
        Ok(Self {
            client,
            url: config.url.clone(),
            token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request a certificate covering `domains`.
    ///
    /// A server-reported error comes back as `Ok` with
    /// [`CertResponse::server_error`] set; only transport failures and non-2xx
    /// statuses are `Err`.
    pub async fn get_cert(&self, domains: &[String]) -> Result<CertResponse, ClientError> {
        trace!(url = %self.url, domains = ?domains, "Requesting certificate");

        let mut request = self.client.post(&self.url).json(&CertRequest {
            domains: domains.to_vec(),
        });
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Token {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }

        let cert: CertResponse = response.json().await?;
        debug!(
            url = %self.url,
            renew_time_left = ?cert.renew_time_left,
            server_error = cert.server_error().unwrap_or(""),
            "Received certificate response"
        );
        Ok(cert)
    }
}
