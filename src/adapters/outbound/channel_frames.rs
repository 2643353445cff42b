//! Channel Frame Adapters
//!
//! In-process display and camera connected by a tokio broadcast channel:
//! whatever the display shows, every open capture stream sees.

use crate::domain::errors::SyncError;
use crate::domain::ports::{CaptureDevice, FrameDisplay, FrameStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// Display that publishes every shown frame on a broadcast channel.
pub struct ChannelFrameDisplay {
    tx: broadcast::Sender<String>,
    current: Mutex<Option<String>>,
    shown: AtomicUsize,
}

impl ChannelFrameDisplay {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            tx,
            current: Mutex::new(None),
            shown: AtomicUsize::new(0),
        }
    }

    /// A capture device that sees this display.
    pub fn camera(&self) -> ChannelCaptureDevice {
        ChannelCaptureDevice {
            tx: Some(self.tx.clone()),
            opened: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frame currently on screen, if any.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Total number of show calls.
    pub fn shown_count(&self) -> usize {
        self.shown.load(Ordering::Relaxed)
    }
}

impl Default for ChannelFrameDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDisplay for ChannelFrameDisplay {
    fn show(&self, frame: &str) {
        *self.current.lock() = Some(frame.to_string());
        self.shown.fetch_add(1, Ordering::Relaxed);
        // no receivers is fine: nobody is looking
        let _ = self.tx.send(frame.to_string());
    }

    fn clear(&self) {
        *self.current.lock() = None;
    }
}

/// Capture device reading frames from a `ChannelFrameDisplay`.
#[derive(Clone)]
pub struct ChannelCaptureDevice {
    tx: Option<broadcast::Sender<String>>,
    opened: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl ChannelCaptureDevice {
    /// A device whose permission is always denied.
    pub fn denied() -> Self {
        Self {
            tx: None,
            opened: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for ChannelCaptureDevice {
    async fn open(&self) -> Result<Box<dyn FrameStream>, SyncError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| SyncError::Capability("camera permission denied".into()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ChannelFrameStream {
            rx: Some(tx.subscribe()),
            stopped: self.stopped.clone(),
        }))
    }
}

struct ChannelFrameStream {
    rx: Option<broadcast::Receiver<String>>,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameStream for ChannelFrameStream {
    async fn next_frame(&mut self) -> Option<String> {
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("capture skipped {} frames", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn stop(&mut self) {
        if self.rx.take().is_some() {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_camera_sees_shown_frames() {
        let display = ChannelFrameDisplay::new();
        let camera = display.camera();
        let mut stream = camera.open().await.unwrap();

        display.show("FINT_V2:abc");
        assert_eq!(stream.next_frame().await.as_deref(), Some("FINT_V2:abc"));
        assert_eq!(display.current().as_deref(), Some("FINT_V2:abc"));
        assert_eq!(display.shown_count(), 1);

        display.clear();
        assert_eq!(display.current(), None);
    }

    #[tokio::test]
    async fn test_denied_camera() {
        let camera = ChannelCaptureDevice::denied();
        assert!(matches!(camera.open().await, Err(SyncError::Capability(_))));
        assert_eq!(camera.open_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_counts_once() {
        let display = ChannelFrameDisplay::new();
        let camera = display.camera();
        let mut stream = camera.open().await.unwrap();

        stream.stop();
        stream.stop();

        assert_eq!(camera.open_count(), 1);
        assert_eq!(camera.stop_count(), 1);
        assert_eq!(stream.next_frame().await, None);
    }

    #[tokio::test]
    async fn test_stream_ends_when_display_dropped() {
        let display = ChannelFrameDisplay::new();
        let camera = display.camera();
        let mut stream = camera.open().await.unwrap();

        drop(display);
        drop(camera);
        assert_eq!(stream.next_frame().await, None);
    }
}
