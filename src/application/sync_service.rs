//! Sync Service - Main application use case
//!
//! Orchestrates one sync attempt at a time: reads the local payload from the
//! stores, hands it to the configured transport, and applies whatever comes
//! back. This is the primary interface for the CLI and other front ends.

use crate::codec::Codec;
use crate::domain::entities::{FinanceSnapshot, SyncPayload, UserIdentity};
use crate::domain::errors::SyncError;
use crate::domain::ports::{CaptureDevice, FrameDisplay, RendezvousBroker, SyncStore};
use crate::domain::services::MergeEngine;
use crate::domain::value_objects::RendezvousLink;
use crate::infrastructure::{SessionGuard, SessionLock};
use crate::transport::{
    BroadcastHandle, CancelHandle, PeerFlow, PeerOutcome, PeerSession, PeerSessionState, SyncConfig,
    TransportKind, VisualTransport,
};
use std::sync::Arc;
use tokio::sync::watch;

/// Where an incoming payload comes from.
pub enum ReceiveInput<'a> {
    /// Scan broadcast frames from a camera
    Camera(&'a dyn CaptureDevice),
    /// A complete wire string, e.g. pasted by the user
    Wire(&'a str),
    /// Join a peer session (link or bare id) and clone from the host
    Peer(&'a str),
    /// Join a peer session and run the bidirectional merge
    PeerMerge(&'a str),
}

/// What a completed attempt did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Local payload delivered to a peer; store untouched
    Sent,
    /// Local snapshot replaced by the remote one
    Replaced,
    /// Local snapshot replaced by the merge of both sides
    Merged,
}

/// Summary of a completed sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub action: SyncAction,
    pub identity: UserIdentity,
    pub transactions: usize,
    pub accounts: usize,
}

impl SyncReport {
    fn new(action: SyncAction, payload: &SyncPayload) -> Self {
        Self {
            action,
            identity: payload.identity.clone(),
            transactions: payload.snapshot.transactions.len(),
            accounts: payload.snapshot.accounts.len(),
        }
    }
}

/// Store handle shared by the service and the sessions it hands out.
#[derive(Clone)]
struct Stores {
    store: Arc<dyn SyncStore>,
}

impl Stores {
    /// Read the signed-in user's payload.
    async fn local_payload(&self) -> Result<SyncPayload, SyncError> {
        let identity = self
            .store
            .current()
            .await?
            .ok_or_else(|| SyncError::Storage("no identity signed in".into()))?;
        let snapshot = self
            .store
            .load(&identity.id)
            .await?
            .unwrap_or_else(FinanceSnapshot::new);
        let credential = self.store.credential().await?;
        Ok(SyncPayload::new(identity, snapshot, credential))
    }

    /// Replace the stored snapshot with a received one.
    ///
    /// Settings and conversation history never travel on the wire; the
    /// receiver keeps its own for that identity.
    async fn apply_replace(&self, remote: SyncPayload) -> Result<SyncPayload, SyncError> {
        let identity_id = remote.identity.id.clone();
        let existing = self.store.load(&identity_id).await?;
        let local_credential = match self.store.current().await? {
            Some(current) if current.id == identity_id => self.store.credential().await?,
            _ => None,
        };

        let mut snapshot = remote.snapshot;
        if let Some(existing) = existing {
            snapshot.settings = existing.settings;
            snapshot.conversation_history = existing.conversation_history;
        }
        let credential =
            MergeEngine::merge_credential(remote.credential.as_deref(), local_credential.as_deref());

        let applied = SyncPayload::new(remote.identity, snapshot, credential);
        self.persist(&applied).await?;
        tracing::info!(
            "snapshot replaced identity={} transactions={} accounts={}",
            applied.identity.id,
            applied.snapshot.transactions.len(),
            applied.snapshot.accounts.len()
        );
        Ok(applied)
    }

    /// Identity, snapshot and credential land together or not at all.
    async fn persist(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        self.store.commit(payload).await
    }
}

/// Orchestrates sync attempts for one device.
pub struct SyncService {
    codec: Codec,
    config: SyncConfig,
    stores: Stores,
    display: Option<Arc<dyn FrameDisplay>>,
    broker: Option<Arc<dyn RendezvousBroker>>,
    lock: SessionLock,
}

impl SyncService {
    /// Create a new sync service.
    pub fn new(store: Arc<dyn SyncStore>, config: SyncConfig) -> Self {
        Self {
            codec: Codec::standard(),
            config,
            stores: Stores { store },
            display: None,
            broker: None,
            lock: SessionLock::new(),
        }
    }

    /// Use a custom codec.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Attach the surface broadcast frames are shown on.
    pub fn with_display(mut self, display: Arc<dyn FrameDisplay>) -> Self {
        self.display = Some(display);
        self
    }

    /// Attach the rendezvous broker for peer sessions.
    pub fn with_broker(mut self, broker: Arc<dyn RendezvousBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether an attempt is currently running.
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    /// The signed-in user's payload as it would be sent.
    pub async fn local_payload(&self) -> Result<SyncPayload, SyncError> {
        self.stores.local_payload().await
    }

    /// Start sending the local dataset to another device.
    ///
    /// Uses the configured transport: broadcast frames start cycling on the
    /// display immediately; a duplex session returns with its rendezvous link
    /// and must be driven with `HostedSession::finish`.
    pub async fn start_clone(&self) -> Result<CloneSession, SyncError> {
        let guard = self.lock.try_acquire()?;
        let payload = self.stores.local_payload().await?;

        match self.config.transport {
            TransportKind::Broadcast => {
                let display = self
                    .display
                    .clone()
                    .ok_or_else(|| SyncError::Capability("no frame display available".into()))?;
                let handle = VisualTransport::new(self.codec.clone(), &self.config).broadcast(&payload, display)?;
                Ok(CloneSession::Broadcast(BroadcastSession {
                    handle,
                    _guard: guard,
                }))
            }
            TransportKind::Duplex => {
                let session = self.host(PeerFlow::CloneSend(payload), guard).await?;
                Ok(CloneSession::Peer(session))
            }
        }
    }

    /// Start the bidirectional merge as host.
    pub async fn start_merge(&self) -> Result<HostedSession, SyncError> {
        let guard = self.lock.try_acquire()?;
        let payload = self.stores.local_payload().await?;
        self.host(PeerFlow::Merge(payload), guard).await
    }

    /// Receive a payload and apply it to the local store.
    ///
    /// Nothing is written unless the payload decodes completely.
    pub async fn receive(&self, input: ReceiveInput<'_>) -> Result<SyncReport, SyncError> {
        let _guard = self.lock.try_acquire()?;

        match input {
            ReceiveInput::Camera(device) => {
                let remote = VisualTransport::new(self.codec.clone(), &self.config).scan(device).await?;
                let applied = self.stores.apply_replace(remote).await?;
                Ok(SyncReport::new(SyncAction::Replaced, &applied))
            }
            ReceiveInput::Wire(wire) => {
                let remote = self.codec.decode(wire)?;
                let applied = self.stores.apply_replace(remote).await?;
                Ok(SyncReport::new(SyncAction::Replaced, &applied))
            }
            ReceiveInput::Peer(link) => self.join(link, PeerFlow::CloneReceive).await,
            ReceiveInput::PeerMerge(link) => {
                let local = self.stores.local_payload().await?;
                self.join(link, PeerFlow::Merge(local)).await
            }
        }
    }

    async fn join(&self, link: &str, flow: PeerFlow) -> Result<SyncReport, SyncError> {
        let merging = matches!(flow, PeerFlow::Merge(_));
        let mut session = PeerSession::client(self.broker()?, self.codec.clone(), &self.config);

        match session.join(link, flow).await? {
            PeerOutcome::Replace(remote) => {
                let applied = self.stores.apply_replace(remote).await?;
                let action = if merging { SyncAction::Merged } else { SyncAction::Replaced };
                Ok(SyncReport::new(action, &applied))
            }
            PeerOutcome::Merged(merged) => {
                self.stores.persist(&merged).await?;
                Ok(SyncReport::new(SyncAction::Merged, &merged))
            }
            PeerOutcome::Sent => Err(SyncError::Connection("peer sent nothing to apply".into())),
        }
    }

    async fn host(&self, flow: PeerFlow, guard: SessionGuard) -> Result<HostedSession, SyncError> {
        let mut session = PeerSession::host(self.broker()?, self.codec.clone(), &self.config);
        let link = session.generate().await?;
        Ok(HostedSession {
            session,
            flow,
            link,
            stores: self.stores.clone(),
            _guard: guard,
        })
    }

    fn broker(&self) -> Result<Arc<dyn RendezvousBroker>, SyncError> {
        self.broker
            .clone()
            .ok_or_else(|| SyncError::Capability("no rendezvous broker available".into()))
    }
}

/// A clone attempt in progress, by transport.
pub enum CloneSession {
    Broadcast(BroadcastSession),
    Peer(HostedSession),
}

/// Frames cycling on the display. Stop or drop to end the broadcast.
pub struct BroadcastSession {
    handle: BroadcastHandle,
    _guard: SessionGuard,
}

impl BroadcastSession {
    pub fn frame_count(&self) -> usize {
        self.handle.frame_count()
    }

    pub fn stop(mut self) {
        self.handle.stop();
    }
}

/// A registered peer session waiting for its client.
pub struct HostedSession {
    session: PeerSession,
    flow: PeerFlow,
    link: RendezvousLink,
    stores: Stores,
    _guard: SessionGuard,
}

impl HostedSession {
    /// Link the other device opens to join.
    pub fn link(&self) -> &RendezvousLink {
        &self.link
    }

    pub fn state(&self) -> PeerSessionState {
        self.session.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<PeerSessionState> {
        self.session.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.session.cancel_handle()
    }

    /// Wait for the client, run the exchange and apply the result.
    pub async fn finish(mut self) -> Result<SyncReport, SyncError> {
        let outcome = self.session.run(self.flow.clone()).await?;
        match outcome {
            PeerOutcome::Sent => match &self.flow {
                PeerFlow::CloneSend(payload) => Ok(SyncReport::new(SyncAction::Sent, payload)),
                _ => Err(SyncError::Connection("unexpected peer outcome".into())),
            },
            PeerOutcome::Merged(merged) => {
                self.stores.persist(&merged).await?;
                tracing::info!(
                    "merge applied identity={} transactions={} accounts={}",
                    merged.identity.id,
                    merged.snapshot.transactions.len(),
                    merged.snapshot.accounts.len()
                );
                Ok(SyncReport::new(SyncAction::Merged, &merged))
            }
            PeerOutcome::Replace(remote) => {
                let applied = self.stores.apply_replace(remote).await?;
                Ok(SyncReport::new(SyncAction::Replaced, &applied))
            }
        }
    }

    /// Abandon the session before a client joins.
    pub async fn cancel(mut self) {
        self.session.cancel().await;
    }
}
