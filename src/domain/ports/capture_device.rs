//! Capture Device Port
//!
//! Defines the interface to a camera (or any frame source) that yields
//! decoded visual-code contents.

use crate::domain::errors::SyncError;
use async_trait::async_trait;

/// A device that can be opened to stream captured frames.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device.
    ///
    /// Fails with `SyncError::Capability` when the device is missing or
    /// permission is denied.
    async fn open(&self) -> Result<Box<dyn FrameStream>, SyncError>;
}

/// An open capture stream.
///
/// Owners must call `stop` exactly once when done; the visual receiver wraps
/// streams in a guard that guarantees this.
#[async_trait]
pub trait FrameStream: Send {
    /// Next successfully decoded frame, or None when the device stopped.
    async fn next_frame(&mut self) -> Option<String>;

    /// Release the underlying device.
    fn stop(&mut self);
}
