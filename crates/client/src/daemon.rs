//! Daemon: owns the watched certificates and drives the configured transport.

use std::sync::Arc;

use anyhow::Context;
use certdx_config::{ClientConfig, Mode};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::failover::{FailoverLoop, FailoverSettings, Role};
use crate::handlers::WriteCertAndRunCommand;
use crate::polling::HttpServers;
use crate::sds::SdsClient;
use crate::signals::ShutdownSignals;
use crate::storage;
use crate::watch::{CertUpdateHandler, WatchedCert};

pub struct Daemon {
    config: ClientConfig,
    certs: Vec<Arc<WatchedCert>>,
    streams: Vec<Arc<SdsClient>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl Daemon {
    /// Build watched certificates from the configuration, seeding each one
    /// from previously saved files when present.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_handlers(config, vec![WriteCertAndRunCommand::shared()])
    }

    pub fn with_handlers(config: ClientConfig, handlers: Vec<Arc<dyn CertUpdateHandler>>) -> Self {
        let certs = config
            .certifications
            .iter()
            .map(|c| {
                let cert = WatchedCert::new(Arc::new(c.clone()), handlers.clone());
                match storage::load_saved_cert(c) {
                    Ok(Some((fullchain, key))) => cert.seed(fullchain, key),
                    Ok(None) => {}
                    Err(e) => warn!(cert = %c.name, error = %e, "Ignoring unreadable saved certificate"),
                }
                Arc::new(cert)
            })
            .collect();

        Self {
            config,
            certs,
            streams: Vec::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn certs(&self) -> &[Arc<WatchedCert>] {
        &self.certs
    }

    /// Run in the configured mode until a shutdown signal.
    pub async fn run(mut self) -> anyhow::Result<()> {
        match self.config.server.mode {
            Mode::Http => self.start_http()?,
            Mode::Grpc => self.start_grpc(),
        }

        let mut signals = ShutdownSignals::install().context("failed to install signal handlers")?;
        let signal = signals.recv().await;
        info!(signal = %signal, mode = %self.config.server.mode, "Stopping client");

        tokio::spawn(async move {
            signals.recv().await;
            error!("Fast dying...");
            std::process::exit(1);
        });

        self.stop();
        self.wait().await;
        info!("Client stopped");
        Ok(())
    }

    /// Start watchers and one polling watchdog per certificate.
    pub fn start_http(&self) -> anyhow::Result<()> {
        let servers = Arc::new(
            HttpServers::from_config(&self.config).context("failed to build http clients")?,
        );
        self.start_watchers();
        for cert in &self.certs {
            self.tracker
                .spawn(Arc::clone(&servers).watchdog(Arc::clone(cert)));
        }
        info!(certs = self.certs.len(), "Http client started");
        Ok(())
    }

    /// Start watchers and the main stream loop, with standby failover when
    /// a standby server is configured.
    pub fn start_grpc(&mut self) {
        self.start_watchers();

        let settings = FailoverSettings::from_config(&self.config.server);
        let main = Arc::new(SdsClient::new(
            Role::Main,
            self.config.grpc.main_server.clone(),
            self.certs.clone(),
        ));
        self.streams.push(Arc::clone(&main));

        let standby = self.config.grpc.standby().map(|server| {
            let standby = Arc::new(SdsClient::new(
                Role::Standby,
                server.clone(),
                self.certs.clone(),
            ));
            self.streams.push(Arc::clone(&standby));
            Arc::new(FailoverLoop::new(standby, settings))
        });

        let main_loop = Arc::new(FailoverLoop::new(main, settings));
        self.tracker.spawn(main_loop.run_main(
            standby,
            self.shutdown.clone(),
            self.tracker.clone(),
        ));
        info!(certs = self.certs.len(), "gRPC client started");
    }

    /// Stop every watcher and stream.
    pub fn stop(&self) {
        self.shutdown.cancel();
        for cert in &self.certs {
            cert.stop();
        }
        for stream in &self.streams {
            stream.kill();
        }
    }

    /// Wait for every task started by the daemon to finish.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    fn start_watchers(&self) {
        for cert in &self.certs {
            let cert = Arc::clone(cert);
            self.tracker.spawn(async move { cert.watch().await });
        }
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("mode", &self.config.server.mode)
            .field("certs", &self.certs.len())
            .field("streams", &self.streams.len())
            .finish()
    }
}
