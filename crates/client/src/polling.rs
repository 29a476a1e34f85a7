//! Polling mode: one watchdog per certificate.
//!
//! Each watchdog asks the main server for its certificate, falls back to the
//! standby when the main server's retry budget is spent, and sleeps for a
//! quarter of the renewal lead time before asking again.

use std::sync::Arc;
use std::time::Duration;

use certdx_common::retry;
use certdx_config::ClientConfig;
use certdx_protocol::CertResponse;
use tracing::{debug, error, info, warn};

use crate::errors::ClientError;
use crate::failover::Role;
use crate::http::HttpCertClient;
use crate::watch::{CertMaterial, WatchedCert};

/// Interval used before the first success and after a failed cycle.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Lower bound on the interval derived from the renewal lead time.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Time to wait before polling again after a successful response.
pub fn next_poll_interval(renew_time_left: Duration) -> Duration {
    (renew_time_left / 4).max(MIN_POLL_INTERVAL)
}

/// Main and optional standby polling servers.
#[derive(Debug, Clone)]
pub struct HttpServers {
    main: HttpCertClient,
    standby: Option<HttpCertClient>,
    retry_count: u32,
}

impl HttpServers {
    pub fn new(main: HttpCertClient, standby: Option<HttpCertClient>, retry_count: u32) -> Self {
        Self {
            main,
            standby,
            retry_count,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let main = HttpCertClient::new(&config.http.main_server)?;
        let standby = config
            .http
            .standby()
            .map(HttpCertClient::new)
            .transpose()?;
        Ok(Self::new(main, standby, config.server.retry_count))
    }

    /// Fetch a certificate, trying main then standby with the retry budget each.
    pub async fn request_cert(&self, domains: &[String]) -> Result<CertResponse, ClientError> {
        let main = retry(self.retry_count, || self.main.get_cert(domains)).await;
        let err = match main {
            Ok(resp) => return Ok(resp),
            Err(e) => e,
        };
        warn!(
            role = %Role::Main,
            url = %self.main.url(),
            domains = ?domains,
            error = %err,
            "Failed to get certificate"
        );

        let Some(standby) = &self.standby else {
            return Err(err);
        };
        retry(self.retry_count, || standby.get_cert(domains))
            .await
            .inspect_err(|e| {
                warn!(
                    role = %Role::Standby,
                    url = %standby.url(),
                    domains = ?domains,
                    error = %e,
                    "Failed to get certificate"
                );
            })
    }

    /// Run one poll cycle for `cert` and return how long to wait before the next.
    ///
    /// Returns `None` when the certificate was stopped while delivering.
    pub async fn poll_once(&self, cert: &WatchedCert) -> Option<Duration> {
        info!(cert = %cert.name(), domains = ?cert.domains(), "Requesting certificate");

        let resp = match self.request_cert(cert.domains()).await {
            Ok(resp) => resp,
            Err(_) => {
                error!(cert = %cert.name(), "Failed to request certificate, retry next round");
                return Some(DEFAULT_POLL_INTERVAL);
            }
        };
        if let Some(server_error) = resp.server_error() {
            error!(cert = %cert.name(), error = %server_error, "Server refused certificate request");
            return Some(DEFAULT_POLL_INTERVAL);
        }

        let interval = next_poll_interval(resp.renew_time_left);
        let material = CertMaterial::new(cert.domains().to_vec(), resp.full_chain, resp.key);
        if !cert.push(material, None).await {
            return None;
        }
        Some(interval)
    }

    /// Poll for `cert` until its stop signal fires.
    pub async fn watchdog(self: Arc<Self>, cert: Arc<WatchedCert>) {
        let stop = cert.stop_signal();
        loop {
            let interval = tokio::select! {
                _ = stop.cancelled() => break,
                interval = self.poll_once(&cert) => match interval {
                    Some(interval) => interval,
                    None => break,
                },
            };

            debug!(cert = %cert.name(), next_poll = ?interval, "Scheduled next poll");
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!(cert = %cert.name(), "Certificate watchdog stopped");
    }
}
