//! Stream Peer Channel
//!
//! Implements PeerChannel over any byte stream using length-prefixed
//! messages (4-byte big-endian length, then the body).

use crate::domain::errors::SyncError;
use crate::domain::ports::PeerChannel;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Prefix `data` with its big-endian u32 length.
pub fn encode_frame(data: &[u8]) -> Result<Vec<u8>, SyncError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(SyncError::Connection(format!(
            "message too large: {} bytes (max {})",
            data.len(),
            MAX_MESSAGE_SIZE
        )));
    }
    let len = data.len() as u32;
    let mut result = Vec::with_capacity(4 + data.len());
    result.extend_from_slice(&len.to_be_bytes());
    result.extend_from_slice(data);
    Ok(result)
}

/// Message channel over a single duplex byte stream.
pub struct StreamPeerChannel<S> {
    stream: Option<S>,
}

impl<S> StreamPeerChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream: Some(stream) }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> Result<&mut S, SyncError> {
        self.stream
            .as_mut()
            .ok_or_else(|| SyncError::Connection("channel closed".into()))
    }
}

#[async_trait]
impl<S> PeerChannel for StreamPeerChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn opened(&mut self) -> Result<(), SyncError> {
        self.stream().map(|_| ())
    }

    async fn send(&mut self, data: Bytes) -> Result<(), SyncError> {
        let frame = encode_frame(&data)?;
        let stream = self.stream()?;
        stream.write_all(&frame).await.map_err(SyncError::connection)?;
        stream.flush().await.map_err(SyncError::connection)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, SyncError> {
        let stream = self.stream()?;

        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(SyncError::connection(e)),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(SyncError::Connection(format!("peer message too large: {} bytes", len)));
        }

        let mut buf = BytesMut::zeroed(len);
        stream.read_exact(&mut buf).await.map_err(SyncError::connection)?;
        Ok(Some(buf.freeze()))
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("peer channel shutdown: {}", e);
            }
        }
    }
}
