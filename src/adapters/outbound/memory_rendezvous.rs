//! In-Memory Rendezvous Broker
//!
//! Implements RendezvousBroker within one process. Each registered session
//! pairs exactly one host with one client over an in-memory duplex pipe.

use super::stream_peer_channel::StreamPeerChannel;
use crate::domain::errors::SyncError;
use crate::domain::ports::{PeerChannel, RendezvousBroker};
use crate::domain::value_objects::SessionId;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;

/// Pipe buffer per direction.
const DEFAULT_BUFFER: usize = 64 * 1024;

struct PendingSession {
    /// Taken by the first client to connect
    joiner: Option<oneshot::Sender<DuplexStream>>,
    /// Taken by the host when it starts accepting
    acceptor: Option<oneshot::Receiver<DuplexStream>>,
}

/// DashMap-backed broker for local pairing and tests.
pub struct MemoryRendezvous {
    sessions: DashMap<String, PendingSession>,
    buffer: usize,
}

impl MemoryRendezvous {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            buffer,
        }
    }

    /// Number of registered sessions not yet released or consumed.
    pub fn pending_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for MemoryRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RendezvousBroker for MemoryRendezvous {
    async fn create_session(&self) -> Result<SessionId, SyncError> {
        let id = SessionId::random();
        let (tx, rx) = oneshot::channel();
        self.sessions.insert(
            id.as_str().to_string(),
            PendingSession {
                joiner: Some(tx),
                acceptor: Some(rx),
            },
        );
        tracing::debug!("rendezvous session registered id={}", id);
        Ok(id)
    }

    async fn accept(&self, session: &SessionId) -> Result<Box<dyn PeerChannel>, SyncError> {
        let acceptor = {
            let mut entry = self
                .sessions
                .get_mut(session.as_str())
                .ok_or_else(|| SyncError::Connection(format!("unknown session {}", session)))?;
            entry.acceptor.take().ok_or(SyncError::SessionBusy)?
        };

        let stream = acceptor
            .await
            .map_err(|_| SyncError::Connection(format!("session {} released", session)))?;

        // one inbound connection per session
        self.sessions.remove(session.as_str());
        tracing::debug!("rendezvous session paired id={}", session);
        Ok(Box::new(StreamPeerChannel::new(stream)))
    }

    async fn connect(&self, session: &SessionId) -> Result<Box<dyn PeerChannel>, SyncError> {
        let joiner = {
            let mut entry = self
                .sessions
                .get_mut(session.as_str())
                .ok_or_else(|| SyncError::Connection(format!("unknown session {}", session)))?;
            entry
                .joiner
                .take()
                .ok_or_else(|| SyncError::Connection(format!("session {} already joined", session)))?
        };

        let (host_end, client_end) = tokio::io::duplex(self.buffer);
        joiner
            .send(host_end)
            .map_err(|_| SyncError::Connection(format!("host left session {}", session)))?;

        Ok(Box::new(StreamPeerChannel::new(client_end)))
    }

    async fn release(&self, session: &SessionId) {
        if self.sessions.remove(session.as_str()).is_some() {
            tracing::debug!("rendezvous session released id={}", session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_pairs_host_and_client() {
        let broker = MemoryRendezvous::new();
        let id = broker.create_session().await.unwrap();
        assert_eq!(broker.pending_sessions(), 1);

        let mut client = broker.connect(&id).await.unwrap();
        let mut host = broker.accept(&id).await.unwrap();
        assert_eq!(broker.pending_sessions(), 0);

        client.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(host.recv().await.unwrap().unwrap(), Bytes::from_static(b"ping"));
        host.send(Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(client.recv().await.unwrap().unwrap(), Bytes::from_static(b"pong"));
    }

    #[tokio::test]
    async fn test_second_client_rejected() {
        let broker = MemoryRendezvous::new();
        let id = broker.create_session().await.unwrap();

        let _first = broker.connect(&id).await.unwrap();
        assert!(matches!(broker.connect(&id).await, Err(SyncError::Connection(_))));
    }

    #[tokio::test]
    async fn test_connect_unknown_session() {
        let broker = MemoryRendezvous::new();
        let id = SessionId::parse("missing").unwrap();
        assert!(matches!(broker.connect(&id).await, Err(SyncError::Connection(_))));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let broker = MemoryRendezvous::new();
        let id = broker.create_session().await.unwrap();

        broker.release(&id).await;
        broker.release(&id).await;

        assert_eq!(broker.pending_sessions(), 0);
        assert!(broker.connect(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_after_host_cancelled_accept() {
        let broker = MemoryRendezvous::new();
        let id = broker.create_session().await.unwrap();

        // host starts accepting, then gives up
        let accept = tokio::time::timeout(std::time::Duration::from_millis(5), broker.accept(&id)).await;
        assert!(accept.is_err());

        assert!(matches!(broker.connect(&id).await, Err(SyncError::Connection(_))));
    }
}
