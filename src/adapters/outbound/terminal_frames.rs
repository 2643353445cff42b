//! Terminal Frame Adapters
//!
//! Text stand-ins for a screen and a camera: frames are written to stdout one
//! per line, and captured frames are read line by line from any async reader
//! (stdin, a pipe, a file).

use crate::domain::errors::SyncError;
use crate::domain::ports::{CaptureDevice, FrameDisplay, FrameStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// Writes each shown frame on its own stdout line.
#[derive(Debug, Default)]
pub struct StdoutFrameDisplay;

impl FrameDisplay for StdoutFrameDisplay {
    fn show(&self, frame: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", frame).and_then(|_| out.flush()) {
            tracing::warn!("failed to write frame: {}", e);
        }
    }

    fn clear(&self) {}
}

/// Capture device yielding one frame per input line.
///
/// The reader can be opened once; a second open reports the device busy.
pub struct LineCaptureDevice<R> {
    reader: Mutex<Option<R>>,
}

impl<R> LineCaptureDevice<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
        }
    }
}

impl LineCaptureDevice<tokio::io::BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R> CaptureDevice for LineCaptureDevice<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn open(&self) -> Result<Box<dyn FrameStream>, SyncError> {
        let reader = self
            .reader
            .lock()
            .take()
            .ok_or_else(|| SyncError::Capability("capture device already in use".into()))?;
        Ok(Box::new(LineFrameStream {
            lines: Some(reader.lines()),
        }))
    }
}

struct LineFrameStream<R> {
    lines: Option<Lines<R>>,
}

#[async_trait]
impl<R> FrameStream for LineFrameStream<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(line),
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!("capture read failed: {}", e);
                    return None;
                }
            }
        }
    }

    fn stop(&mut self) {
        self.lines = None;
    }
}
