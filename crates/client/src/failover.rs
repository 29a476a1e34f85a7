//! Main/standby failover for secret discovery streams.
//!
//! A [`FailoverLoop`] keeps reconnecting one [`StreamSource`]. Failures that
//! happen within [`FailoverSettings::window`] of connecting count against the
//! retry budget; a stream that lived longer resets the count and reconnects at
//! once. When the main loop exhausts its budget it starts the standby loop and
//! arms a hand-off: the next response main receives kills the standby.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use certdx_config::ServerConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::errors::SdsError;

/// Attempts shorter than this count as failures.
pub const FAILURE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Pause between attempts while the retry budget lasts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Main,
    Standby,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Main => write!(f, "main"),
            Role::Standby => write!(f, "standby"),
        }
    }
}

/// Something that can run a stream until it fails or is killed.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    fn role(&self) -> Role;

    /// Run one stream attempt to completion.
    async fn stream(&self) -> SdsError;

    fn kill(&self);

    /// Token cancelled the next time this source receives a response.
    fn received_signal(&self) -> Arc<tokio_util::sync::CancellationToken>;
}

#[derive(Debug, Clone, Copy)]
pub struct FailoverSettings {
    pub retry_count: u32,
    pub reconnect_interval: Duration,
    pub window: Duration,
    pub backoff: Duration,
}

impl FailoverSettings {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            retry_count: server.retry_count,
            reconnect_interval: server.reconnect_interval,
            window: FAILURE_WINDOW,
            backoff: RETRY_BACKOFF,
        }
    }
}

pub struct FailoverLoop<S> {
    source: Arc<S>,
    settings: FailoverSettings,
    running: AtomicBool,
}

impl<S: StreamSource> FailoverLoop<S> {
    pub fn new(source: Arc<S>, settings: FailoverSettings) -> Self {
        Self {
            source,
            settings,
            running: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Whether this loop is currently driving its source.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Drive the main source until it is killed or `shutdown` fires.
    ///
    /// Standby loops and hand-off forwarders are spawned on `tracker`.
    pub async fn run_main(
        self: Arc<Self>,
        standby: Option<Arc<FailoverLoop<S>>>,
        shutdown: CancellationToken,
        tracker: TaskTracker,
    ) {
        self.running.store(true, Ordering::Release);
        self.drive(&shutdown, || {
            if let Some(standby) = &standby {
                self.start_standby(standby, &shutdown, &tracker);
            }
        })
        .await;
        self.running.store(false, Ordering::Release);
    }

    /// Drive a standby source. Clears the running flag on exit.
    async fn run_standby(self: Arc<Self>, shutdown: CancellationToken) {
        self.drive(&shutdown, || {}).await;
        self.running.store(false, Ordering::Release);
    }

    fn start_standby(
        &self,
        standby: &Arc<FailoverLoop<S>>,
        shutdown: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        if standby
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        info!(role = %standby.source.role(), "Starting standby stream");
        tracker.spawn(Arc::clone(standby).run_standby(shutdown.clone()));

        let received = self.source.received_signal();
        let standby_source = Arc::clone(&standby.source);
        let shutdown = shutdown.clone();
        tracker.spawn(async move {
            tokio::select! {
                _ = received.cancelled() => {
                    info!("Main server is responding again, stopping standby stream");
                    standby_source.kill();
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    async fn drive<F: FnMut()>(&self, shutdown: &CancellationToken, mut on_exhausted: F) {
        let role = self.source.role();
        let mut failures: u32 = 0;

        loop {
            info!(role = %role, "Starting stream");
            let started = Instant::now();
            let err = self.source.stream().await;
            if err.is_killed() {
                info!(role = %role, "Stream killed");
                return;
            }
            warn!(role = %role, error = %err, "Stream stopped");

            // Measured from the start of this attempt for both roles, so a
            // standby that has been looping for a while still counts a quick
            // failure against its budget.
            if started.elapsed() < self.settings.window {
                failures += 1;
            } else {
                failures = 0;
                continue;
            }

            info!(role = %role, failures = failures, "Current retry count");
            if failures < self.settings.retry_count {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.backoff) => continue,
                    _ = shutdown.cancelled() => return,
                }
            }

            on_exhausted();

            failures = 0;
            info!(
                role = %role,
                after = ?self.settings.reconnect_interval,
                "Retry budget exhausted, will reconnect later"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.settings.reconnect_interval) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

impl<S> fmt::Debug for FailoverLoop<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverLoop")
            .field("settings", &self.settings)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
