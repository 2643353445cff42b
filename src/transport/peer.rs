//! Peer Session Transport
//!
//! Two-way interactive transfer between a host and a client that meet
//! through a rendezvous broker.
//!
//! ## State machine
//!
//! ```text
//! idle → generating → waiting → connected → sending/receiving → complete
//!                 any non-terminal state → error (transport failure)
//!                 any non-terminal state → idle  (cancel, after teardown)
//! ```
//!
//! ## Flows
//!
//! - **Clone**: the side holding data sends once; the other replaces its
//!   snapshot with what it receives.
//! - **Merge**: the client sends first; the host merges and sends the merged
//!   payload back; the client replaces with it. Exactly one merge per session.

use crate::codec::Codec;
use crate::domain::entities::SyncPayload;
use crate::domain::errors::SyncError;
use crate::domain::ports::{PeerChannel, RendezvousBroker};
use crate::domain::services::MergeEngine;
use crate::domain::value_objects::{RendezvousLink, SessionId};
use crate::transport::config::SyncConfig;
use bytes::Bytes;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle of one peer sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSessionState {
    Idle,
    Generating,
    Waiting,
    Connected,
    Sending,
    Receiving,
    Complete,
    Error,
}

impl PeerSessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for PeerSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Waiting => "waiting",
            Self::Connected => "connected",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Which end of the rendezvous this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Registers the session and waits for one inbound connection
    Host,
    /// Joins a session registered by a host
    Client,
}

/// What this side contributes to the session.
#[derive(Debug, Clone)]
pub enum PeerFlow {
    /// Clone flow, data-holding side
    CloneSend(SyncPayload),
    /// Clone flow, empty side
    CloneReceive,
    /// Bidirectional flow with the local payload
    Merge(SyncPayload),
}

/// How the attempt ended for this side.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerOutcome {
    /// The local payload was delivered; nothing to apply
    Sent,
    /// Replace the local snapshot with this payload
    Replace(SyncPayload),
    /// Host side of a merge: persist this payload, already sent back
    Merged(SyncPayload),
}

/// Cancels a running peer session from another task.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// One peer sync attempt.
///
/// Owns its rendezvous registration; the channel lives only for the duration
/// of `run`/`join` and is closed before they return.
pub struct PeerSession {
    role: PeerRole,
    broker: Arc<dyn RendezvousBroker>,
    codec: Codec,
    origin: String,
    close_grace: Duration,
    io_timeout: Duration,
    state_tx: watch::Sender<PeerSessionState>,
    cancel_tx: Arc<watch::Sender<bool>>,
    session_id: Option<SessionId>,
}

impl PeerSession {
    fn new(role: PeerRole, broker: Arc<dyn RendezvousBroker>, codec: Codec, config: &SyncConfig) -> Self {
        let (state_tx, _) = watch::channel(PeerSessionState::Idle);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            role,
            broker,
            codec,
            origin: config.origin.clone(),
            close_grace: config.close_grace,
            io_timeout: config.connect_timeout,
            state_tx,
            cancel_tx: Arc::new(cancel_tx),
            session_id: None,
        }
    }

    /// Create a host-side session.
    pub fn host(broker: Arc<dyn RendezvousBroker>, codec: Codec, config: &SyncConfig) -> Self {
        Self::new(PeerRole::Host, broker, codec, config)
    }

    /// Create a client-side session.
    pub fn client(broker: Arc<dyn RendezvousBroker>, codec: Codec, config: &SyncConfig) -> Self {
        Self::new(PeerRole::Client, broker, codec, config)
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn state(&self) -> PeerSessionState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PeerSessionState> {
        self.state_tx.subscribe()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Host: obtain a rendezvous id and start waiting for a client.
    pub async fn generate(&mut self) -> Result<RendezvousLink, SyncError> {
        if self.role != PeerRole::Host {
            return Err(SyncError::Connection("only the host generates a session".into()));
        }
        if self.session_id.is_some() {
            return Err(SyncError::SessionBusy);
        }

        self.cancel_tx.send_replace(false);
        self.set_state(PeerSessionState::Generating);

        let broker = self.broker.clone();
        let created = tokio::select! {
            r = broker.create_session() => r,
            _ = cancelled(self.cancel_tx.subscribe()) => Err(SyncError::Cancelled),
        };

        match created {
            Ok(id) => {
                let link = RendezvousLink::new(self.origin.clone(), id.clone());
                self.session_id = Some(id);
                self.set_state(PeerSessionState::Waiting);
                tracing::info!("peer session waiting link={}", link);
                Ok(link)
            }
            Err(e) => {
                self.settle(&e);
                Err(e)
            }
        }
    }

    /// Host: wait for the client and perform the flow.
    pub async fn run(&mut self, flow: PeerFlow) -> Result<PeerOutcome, SyncError> {
        let Some(session) = self.session_id.clone() else {
            return Err(SyncError::Connection("no rendezvous session; generate first".into()));
        };
        if self.role != PeerRole::Host || self.state() != PeerSessionState::Waiting {
            return Err(SyncError::Connection(format!("cannot run from state {}", self.state())));
        }

        let broker = self.broker.clone();
        self.drive(flow, async move { broker.accept(&session).await }).await
    }

    /// Client: join a session from a link or bare id and perform the flow.
    pub async fn join(&mut self, link_or_id: &str, flow: PeerFlow) -> Result<PeerOutcome, SyncError> {
        if self.role != PeerRole::Client {
            return Err(SyncError::Connection("only the client joins a session".into()));
        }
        let session = RendezvousLink::session_from(link_or_id)
            .ok_or_else(|| SyncError::Connection(format!("invalid session link {:?}", link_or_id)))?;

        self.cancel_tx.send_replace(false);
        let broker = self.broker.clone();
        let timeout = self.io_timeout;
        self.drive(flow, async move {
            tokio::time::timeout(timeout, broker.connect(&session))
                .await
                .map_err(|_| SyncError::Connection("timed out connecting to host".into()))?
        })
        .await
    }

    /// Cancel outside of a running exchange: release the registration and
    /// return to idle.
    pub async fn cancel(&mut self) {
        self.cancel_tx.send_replace(true);
        if let Some(id) = self.session_id.take() {
            self.broker.release(&id).await;
        }
        self.set_state(PeerSessionState::Idle);
        tracing::info!("peer session cancelled");
    }

    async fn drive<C>(&mut self, flow: PeerFlow, connect: C) -> Result<PeerOutcome, SyncError>
    where
        C: Future<Output = Result<Box<dyn PeerChannel>, SyncError>> + Send,
    {
        let cancel_rx = self.cancel_tx.subscribe();
        let mut slot: Option<Box<dyn PeerChannel>> = None;

        let result = {
            let exchange = Exchange {
                role: self.role,
                codec: &self.codec,
                state: &self.state_tx,
                io_timeout: self.io_timeout,
            };
            tokio::select! {
                biased;
                r = exchange.run(connect, flow, &mut slot) => r,
                _ = cancelled(cancel_rx) => Err(SyncError::Cancelled),
            }
        };

        // Our payload is already on the wire; a cancel here only cuts the linger short
        if matches!(result, Ok(PeerOutcome::Sent | PeerOutcome::Merged(_))) {
            tokio::select! {
                _ = tokio::time::sleep(self.close_grace) => {}
                _ = cancelled(self.cancel_tx.subscribe()) => {
                    tracing::debug!("cancel during close grace, keeping outcome");
                }
            }
        }

        // Teardown on every exit path
        if let Some(mut channel) = slot.take() {
            channel.close().await;
        }
        if let Some(id) = self.session_id.take() {
            self.broker.release(&id).await;
        }

        match &result {
            Ok(_) => self.set_state(PeerSessionState::Complete),
            Err(e) => self.settle(e),
        }
        result
    }

    fn settle(&self, err: &SyncError) {
        if matches!(err, SyncError::Cancelled) {
            tracing::info!("peer session cancelled");
            self.set_state(PeerSessionState::Idle);
        } else {
            tracing::warn!("peer session failed: {}", err);
            self.set_state(PeerSessionState::Error);
        }
    }

    fn set_state(&self, next: PeerSessionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            tracing::debug!("peer session {:?}: {} -> {}", self.role, prev, next);
        }
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        if let Some(id) = self.session_id.take() {
            if let Ok(rt) = tokio::runtime::Handle::try_current() {
                let broker = self.broker.clone();
                rt.spawn(async move { broker.release(&id).await });
            }
        }
    }
}

/// Resolves once the cancel flag is raised.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Borrowed view of a session used while the channel is live.
struct Exchange<'a> {
    role: PeerRole,
    codec: &'a Codec,
    state: &'a watch::Sender<PeerSessionState>,
    io_timeout: Duration,
}

impl Exchange<'_> {
    async fn run<C>(
        &self,
        connect: C,
        flow: PeerFlow,
        slot: &mut Option<Box<dyn PeerChannel>>,
    ) -> Result<PeerOutcome, SyncError>
    where
        C: Future<Output = Result<Box<dyn PeerChannel>, SyncError>>,
    {
        let channel = slot.insert(connect.await?);
        self.transition(PeerSessionState::Connected);

        tokio::time::timeout(self.io_timeout, channel.opened())
            .await
            .map_err(|_| SyncError::Connection("timed out waiting for channel to open".into()))??;

        match (self.role, flow) {
            (_, PeerFlow::CloneSend(payload)) => {
                self.send(channel.as_mut(), &payload).await?;
                Ok(PeerOutcome::Sent)
            }
            (_, PeerFlow::CloneReceive) => {
                let remote = self.receive(channel.as_mut()).await?;
                Ok(PeerOutcome::Replace(remote))
            }
            (PeerRole::Client, PeerFlow::Merge(local)) => {
                self.send(channel.as_mut(), &local).await?;
                let merged = self.receive(channel.as_mut()).await?;
                Ok(PeerOutcome::Replace(merged))
            }
            (PeerRole::Host, PeerFlow::Merge(local)) => {
                let remote = self.receive(channel.as_mut()).await?;
                let merged = SyncPayload {
                    identity: local.identity.clone(),
                    snapshot: MergeEngine::merge(&local.snapshot, &remote.snapshot),
                    credential: MergeEngine::merge_credential(
                        local.credential.as_deref(),
                        remote.credential.as_deref(),
                    ),
                };
                self.send(channel.as_mut(), &merged).await?;
                Ok(PeerOutcome::Merged(merged))
            }
        }
    }

    async fn send(&self, channel: &mut dyn PeerChannel, payload: &SyncPayload) -> Result<(), SyncError> {
        self.transition(PeerSessionState::Sending);
        let bytes = self.codec.encode_bytes(payload)?;
        tracing::debug!("sending payload bytes={}", bytes.len());
        channel.send(Bytes::from(bytes)).await
    }

    async fn receive(&self, channel: &mut dyn PeerChannel) -> Result<SyncPayload, SyncError> {
        self.transition(PeerSessionState::Receiving);
        let data = tokio::time::timeout(self.io_timeout, channel.recv())
            .await
            .map_err(|_| SyncError::Connection("timed out waiting for peer payload".into()))??
            .ok_or_else(|| SyncError::Connection("peer closed before sending payload".into()))?;

        tracing::debug!("received payload bytes={}", data.len());
        Ok(self.codec.decode_bytes(&data)?)
    }

    fn transition(&self, next: PeerSessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!("peer session {:?}: {} -> {}", self.role, prev, next);
        }
    }
}
