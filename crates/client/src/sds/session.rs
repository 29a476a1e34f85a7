//! One secret discovery session: the fan-out/fan-in over a single stream.
//!
//! ```text
//!                 ┌─ handler(a) ─┐
//! inbound ─ recv ─┼─ handler(b) ─┼─ acks ─ sender ─ outbound
//!                 └─ handler(c) ─┘
//! ```
//!
//! The receiver decodes every response and routes it by secret name to that
//! certificate's handler. Handlers push the material into their
//! [`WatchedCert`] and queue an ack; one sender task forwards acks in order.
//! The first fault anywhere ends the whole session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use certdx_protocol::sds::{self, DiscoveryRequest, DiscoveryResponse, Secret};
use certdx_protocol::ProtocolError;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::SdsError;
use crate::watch::{CertMaterial, WatchedCert};

const OUTBOUND_BUFFER: usize = 16;

/// A response routed to one certificate handler.
struct Routed {
    version_info: String,
    nonce: String,
    secret: Secret,
}

pub(crate) struct Session {
    certs: Vec<Arc<WatchedCert>>,
    outbound: mpsc::Sender<DiscoveryRequest>,
}

impl Session {
    /// Create a session for `certs`.
    ///
    /// The returned stream is the request side of the gRPC call. The initial
    /// request is already queued on it.
    pub(crate) fn open(
        certs: &[Arc<WatchedCert>],
    ) -> Result<(Self, ReceiverStream<DiscoveryRequest>), SdsError> {
        let (outbound, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let initial = sds::initial_request(certs.iter().map(|c| (c.name(), c.domains())));
        outbound.try_send(initial).map_err(|_| SdsError::Closed)?;
        Ok((
            Self {
                certs: certs.to_vec(),
                outbound,
            },
            ReceiverStream::new(rx),
        ))
    }

    /// Drive the session until it ends; the returned error says why.
    ///
    /// Every receipt swaps `received`, cancelling the previous token.
    pub(crate) async fn run<S, K>(
        self,
        mut inbound: S,
        received: &ArcSwap<CancellationToken>,
        killed: K,
    ) -> SdsError
    where
        S: Stream<Item = Result<DiscoveryResponse, tonic::Status>> + Unpin,
        K: Future<Output = ()>,
    {
        let ctx = CancellationToken::new();
        let (err_tx, mut err_rx) = mpsc::channel::<SdsError>(1);
        let (ack_tx, ack_rx) = mpsc::channel::<DiscoveryRequest>(1);
        let mut tasks = JoinSet::new();

        let mut dispatch = HashMap::with_capacity(self.certs.len());
        for cert in &self.certs {
            let (tx, rx) = mpsc::channel(1);
            dispatch.insert(cert.name().to_string(), tx);
            tasks.spawn(handle_cert(
                Arc::clone(cert),
                rx,
                ack_tx.clone(),
                err_tx.clone(),
                ctx.clone(),
            ));
        }
        drop(ack_tx);
        drop(err_tx);
        tasks.spawn(forward_acks(ack_rx, self.outbound, ctx.clone()));

        let reason = tokio::select! {
            biased;
            _ = killed => SdsError::Killed,
            Some(err) = err_rx.recv() => err,
            err = receive(&mut inbound, &dispatch, received) => err,
        };

        ctx.cancel();
        tasks.shutdown().await;
        reason
    }
}

async fn receive<S>(
    inbound: &mut S,
    dispatch: &HashMap<String, mpsc::Sender<Routed>>,
    received: &ArcSwap<CancellationToken>,
) -> SdsError
where
    S: Stream<Item = Result<DiscoveryResponse, tonic::Status>> + Unpin,
{
    loop {
        let response = match inbound.next().await {
            Some(Ok(response)) => response,
            Some(Err(status)) => return SdsError::Status(status),
            None => return SdsError::Closed,
        };
        received.swap(Arc::new(CancellationToken::new())).cancel();

        let secret = match sds::decode_secret(&response) {
            Ok(secret) => secret,
            Err(e) => return e.into(),
        };
        trace!(
            secret = %secret.name,
            version = %response.version_info,
            "Received secret"
        );

        let Some(handler) = dispatch.get(&secret.name) else {
            return ProtocolError::UnknownResource(secret.name).into();
        };
        let routed = Routed {
            version_info: response.version_info,
            nonce: response.nonce,
            secret,
        };
        if handler.send(routed).await.is_err() {
            return SdsError::Closed;
        }
    }
}

async fn handle_cert(
    cert: Arc<WatchedCert>,
    mut rx: mpsc::Receiver<Routed>,
    ack: mpsc::Sender<DiscoveryRequest>,
    errors: mpsc::Sender<SdsError>,
    ctx: CancellationToken,
) {
    loop {
        let routed = tokio::select! {
            _ = ctx.cancelled() => return,
            routed = rx.recv() => match routed {
                Some(routed) => routed,
                None => return,
            },
        };

        let (fullchain, key) = match sds::tls_material(&routed.secret) {
            Ok(material) => material,
            Err(e) => {
                let _ = errors.try_send(e.into());
                return;
            }
        };

        let material = CertMaterial::new(cert.domains().to_vec(), fullchain, key);
        if !cert.push(material, Some(&ctx)).await {
            return;
        }

        debug!(cert = %cert.name(), version = %routed.version_info, "Acknowledging secret");
        let request = sds::ack_request(&routed.version_info, &routed.nonce, cert.name());
        tokio::select! {
            _ = ctx.cancelled() => return,
            sent = ack.send(request) => if sent.is_err() { return },
        }
    }
}

async fn forward_acks(
    mut acks: mpsc::Receiver<DiscoveryRequest>,
    outbound: mpsc::Sender<DiscoveryRequest>,
    ctx: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            _ = ctx.cancelled() => return,
            request = acks.recv() => match request {
                Some(request) => request,
                None => return,
            },
        };
        tokio::select! {
            _ = ctx.cancelled() => return,
            sent = outbound.send(request) => if sent.is_err() { return },
        }
    }
}
