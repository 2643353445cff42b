//! Rendezvous Ports
//!
//! Defines the discovery broker that pairs two devices and the duplex
//! channel they talk over once paired.

use crate::domain::errors::SyncError;
use crate::domain::value_objects::SessionId;
use async_trait::async_trait;
use bytes::Bytes;

/// Discovery service issuing session ids and routing connection requests.
#[async_trait]
pub trait RendezvousBroker: Send + Sync {
    /// Register a new session and return its identifier.
    async fn create_session(&self) -> Result<SessionId, SyncError>;

    /// Wait for exactly one inbound connection on a registered session.
    async fn accept(&self, session: &SessionId) -> Result<Box<dyn PeerChannel>, SyncError>;

    /// Connect to a session registered by another device.
    async fn connect(&self, session: &SessionId) -> Result<Box<dyn PeerChannel>, SyncError>;

    /// Drop the registration. Idempotent.
    async fn release(&self, session: &SessionId);
}

/// Message-oriented duplex channel between two paired devices.
#[async_trait]
pub trait PeerChannel: Send {
    /// Wait until the channel reports open.
    async fn opened(&mut self) -> Result<(), SyncError>;

    /// Send one complete message.
    async fn send(&mut self, data: Bytes) -> Result<(), SyncError>;

    /// Receive one complete message, or None once the peer closed.
    async fn recv(&mut self) -> Result<Option<Bytes>, SyncError>;

    /// Close the channel. Idempotent.
    async fn close(&mut self);
}
