//! Watched certificates.
//!
//! A [`WatchedCert`] holds the current material for one configured
//! certificate. Transports hand it new material through [`WatchedCert::push`];
//! a single watch task applies each update, skipping byte-identical material
//! and running the registered [`CertUpdateHandler`]s in order on change.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use certdx_config::CertificationConfig;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A certificate chain and its private key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertMaterial {
    pub domains: Vec<String>,
    pub fullchain: Bytes,
    pub key: Bytes,
}

impl CertMaterial {
    pub fn new(domains: Vec<String>, fullchain: impl Into<Bytes>, key: impl Into<Bytes>) -> Self {
        Self {
            domains,
            fullchain: fullchain.into(),
            key: key.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fullchain.is_empty() && self.key.is_empty()
    }

    /// Whether chain and key are byte-identical to `other`.
    pub fn same_material(&self, other: &CertMaterial) -> bool {
        self.fullchain == other.fullchain && self.key == other.key
    }
}

/// Side effect run after a certificate changed.
#[async_trait]
pub trait CertUpdateHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn on_update(
        &self,
        config: &CertificationConfig,
        material: &CertMaterial,
    ) -> anyhow::Result<()>;
}

/// State holder for one configured certificate.
pub struct WatchedCert {
    config: Arc<CertificationConfig>,
    current: ArcSwap<CertMaterial>,
    tx: mpsc::Sender<CertMaterial>,
    /// Owned by whichever task is running [`WatchedCert::watch`]. The lock
    /// only hands the receiver over to a watcher started after a stop; it
    /// is never contended by concurrent watchers.
    rx: Mutex<mpsc::Receiver<CertMaterial>>,
    handlers: Vec<Arc<dyn CertUpdateHandler>>,
    stop: ArcSwap<CancellationToken>,
}

impl WatchedCert {
    pub fn new(
        config: Arc<CertificationConfig>,
        handlers: Vec<Arc<dyn CertUpdateHandler>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let empty = CertMaterial {
            domains: config.domains.clone(),
            ..Default::default()
        };
        Self {
            config,
            current: ArcSwap::from_pointee(empty),
            tx,
            rx: Mutex::new(rx),
            handlers,
            stop: ArcSwap::from_pointee(CancellationToken::new()),
        }
    }

    /// Install previously persisted material without running handlers.
    ///
    /// Only meaningful before the watch task starts.
    pub fn seed(&self, fullchain: impl Into<Bytes>, key: impl Into<Bytes>) {
        self.current.store(Arc::new(CertMaterial::new(
            self.config.domains.clone(),
            fullchain,
            key,
        )));
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn domains(&self) -> &[String] {
        &self.config.domains
    }

    pub fn config(&self) -> &Arc<CertificationConfig> {
        &self.config
    }

    /// The material most recently applied.
    pub fn current(&self) -> Arc<CertMaterial> {
        self.current.load_full()
    }

    /// Queue new material for the watch task.
    ///
    /// Waits for the single channel slot. Gives up, returning `false`, when
    /// the stop signal or `cancel` fires first.
    pub async fn push(&self, material: CertMaterial, cancel: Option<&CancellationToken>) -> bool {
        let stop = self.stop.load_full();
        let never = CancellationToken::new();
        let cancel = cancel.unwrap_or(&never);

        tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!(cert = %self.config.name, "Watcher stopped, dropping update");
                false
            }
            _ = cancel.cancelled() => false,
            sent = self.tx.send(material) => sent.is_ok(),
        }
    }

    /// Apply pushed updates until the current stop signal fires.
    pub async fn watch(&self) {
        let stop = self.stop.load_full();
        let mut rx = self.rx.lock().await;
        debug!(cert = %self.config.name, "Watching certificate");

        loop {
            let material = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                received = rx.recv() => match received {
                    Some(material) => material,
                    None => break,
                },
            };
            self.apply(material).await;
        }

        debug!(cert = %self.config.name, "Certificate watcher stopped");
    }

    /// The stop signal currently in force.
    pub fn stop_signal(&self) -> Arc<CancellationToken> {
        self.stop.load_full()
    }

    /// Cancel the current stop signal.
    pub fn stop(&self) {
        self.stop.load().cancel();
    }

    /// Install a fresh stop signal so a new watch task can be started.
    pub fn renew_stop_signal(&self) {
        self.stop.store(Arc::new(CancellationToken::new()));
    }

    async fn apply(&self, material: CertMaterial) {
        if self.current.load().same_material(&material) {
            debug!(cert = %self.config.name, "Certificate not changed");
            return;
        }

        let material = Arc::new(material);
        self.current.store(Arc::clone(&material));
        info!(cert = %self.config.name, "Certificate updated");

        for handler in &self.handlers {
            if let Err(e) = handler.on_update(&self.config, &material).await {
                error!(
                    cert = %self.config.name,
                    handler = handler.name(),
                    error = %format!("{e:#}"),
                    "Certificate update handler failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for WatchedCert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedCert")
            .field("name", &self.config.name)
            .field("domains", &self.config.domains)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
