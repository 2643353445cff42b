//! Visual Broadcast Transport
//!
//! One-way transfer over a sequence of machine-readable visual codes. The
//! sender cycles frames on a display; the receiver samples a capture device
//! until a complete payload has been decoded.
//!
//! Uses Sans-IO pattern: frame classification and reassembly live in
//! `ScanState`, separated from device I/O for testability.

use crate::codec::{Codec, WireVersion};
use crate::domain::entities::SyncPayload;
use crate::domain::errors::{FormatError, SyncError};
use crate::domain::ports::{CaptureDevice, FrameDisplay, FrameStream};
use crate::transport::chunker::{ChunkEnvelope, Chunker, IngestOutcome, Reassembler};
use crate::transport::config::SyncConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Prefix shared by every frame this application emits.
const FRAME_FAMILY: &str = "FINT_";

// ==================== Sans-IO Scan State ====================

/// What a single captured frame did to the scan.
#[derive(Debug, PartialEq)]
pub enum ScanStep {
    /// Not ours, malformed, or inconsistent: camera noise
    Noise,
    /// A multipart fragment was stored; `fresh` when it was a new index
    Progress { received: usize, total: usize, fresh: bool },
    /// A complete wire string was decoded (or failed to decode)
    Decoded(Result<SyncPayload, FormatError>),
}

/// Receiver-side state of one scan attempt.
pub struct ScanState {
    codec: Codec,
    reassembler: Reassembler,
}

impl ScanState {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            reassembler: Reassembler::new(),
        }
    }

    /// Feed one decoded frame.
    pub fn feed(&mut self, frame: &str) -> ScanStep {
        let frame = frame.trim();

        if ChunkEnvelope::is_multipart(frame) {
            let envelope = match ChunkEnvelope::parse(frame) {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("dropping malformed multipart frame: {}", e);
                    return ScanStep::Noise;
                }
            };
            return match self.reassembler.ingest(envelope) {
                IngestOutcome::Accepted { received, total } => ScanStep::Progress {
                    received,
                    total,
                    fresh: true,
                },
                IngestOutcome::Duplicate { received, total } => ScanStep::Progress {
                    received,
                    total,
                    fresh: false,
                },
                IngestOutcome::Ignored => ScanStep::Noise,
                IngestOutcome::Complete(wire) => ScanStep::Decoded(self.codec.decode(&wire)),
            };
        }

        if WireVersion::detect(frame).is_some() || frame.starts_with(FRAME_FAMILY) {
            return ScanStep::Decoded(self.codec.decode(frame));
        }

        ScanStep::Noise
    }

    pub fn progress(&self) -> Option<(usize, usize)> {
        self.reassembler.progress()
    }

    /// Abandon the current multipart collection.
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }
}

// ==================== Capture Guard ====================

/// RAII guard over an open capture stream.
///
/// Stops the stream exactly once, on drop at the latest.
pub struct CaptureGuard {
    stream: Box<dyn FrameStream>,
    stopped: bool,
}

impl CaptureGuard {
    pub fn new(stream: Box<dyn FrameStream>) -> Self {
        Self {
            stream,
            stopped: false,
        }
    }

    pub async fn next_frame(&mut self) -> Option<String> {
        if self.stopped {
            return None;
        }
        self.stream.next_frame().await
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stream.stop();
            tracing::debug!("capture stream stopped");
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

// ==================== Broadcast Handle ====================

/// Handle to a running frame broadcast.
///
/// Stopping (or dropping) the handle cancels the cycling timer and clears
/// the display.
pub struct BroadcastHandle {
    display: Arc<dyn FrameDisplay>,
    task: Option<JoinHandle<()>>,
    frames: usize,
    stopped: bool,
}

impl BroadcastHandle {
    /// Number of distinct frames being shown.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn is_cycling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.display.clear();
        tracing::debug!("broadcast stopped frames={}", self.frames);
    }
}

impl Drop for BroadcastHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ==================== Visual Transport ====================

/// Upper bound on LZ4 block expansion.
const LZ4_MAX_EXPANSION: usize = 255;

/// Decompressed size no legitimate broadcast under `config` can exceed.
fn max_decoded(config: &SyncConfig) -> usize {
    let wire_chars = config.max_fragment_size.saturating_mul(config.max_fragments);
    // base64 carries 3 bytes per 4 characters
    (wire_chars / 4 * 3).saturating_mul(LZ4_MAX_EXPANSION)
}

/// Broadcast strategy: chunked visual codes, one direction only.
#[derive(Debug, Clone)]
pub struct VisualTransport {
    codec: Codec,
    chunker: Chunker,
    frame_interval: Duration,
    scan_timeout: Duration,
}

impl VisualTransport {
    /// The codec is capped at the largest payload a full set of frames can
    /// carry, so a forged size header cannot force a large allocation.
    pub fn new(codec: Codec, config: &SyncConfig) -> Self {
        Self {
            codec: codec.with_max_decoded(max_decoded(config)),
            chunker: Chunker::new(config.max_fragment_size, config.max_fragments),
            frame_interval: config.frame_interval,
            scan_timeout: config.scan_timeout,
        }
    }

    /// Encode a payload into the frames to display.
    ///
    /// A wire string that fits in one frame is shown as-is; anything larger
    /// is split into multipart envelopes.
    pub fn frames(&self, payload: &SyncPayload) -> Result<Vec<String>, SyncError> {
        let wire = self.codec.encode(payload)?;
        if self.chunker.fits_single_frame(&wire) {
            return Ok(vec![wire]);
        }
        Ok(self
            .chunker
            .split(&wire)?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Start showing a payload on a display.
    pub fn broadcast(
        &self,
        payload: &SyncPayload,
        display: Arc<dyn FrameDisplay>,
    ) -> Result<BroadcastHandle, SyncError> {
        let frames = self.frames(payload)?;
        Ok(Self::show_frames(frames, display, self.frame_interval))
    }

    /// Show pre-built frames, cycling when there is more than one.
    pub fn show_frames(
        frames: Vec<String>,
        display: Arc<dyn FrameDisplay>,
        interval: Duration,
    ) -> BroadcastHandle {
        let count = frames.len();
        tracing::info!("starting broadcast frames={} interval={:?}", count, interval);

        let task = match frames.len() {
            0 => None,
            1 => {
                display.show(&frames[0]);
                None
            }
            _ => {
                let display = display.clone();
                Some(tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    for frame in frames.iter().cycle() {
                        ticker.tick().await;
                        display.show(frame);
                    }
                }))
            }
        };

        BroadcastHandle {
            display,
            task,
            frames: count,
            stopped: false,
        }
    }

    /// Capture frames until a payload is decoded.
    ///
    /// Noise frames are skipped. Once a multipart collection starts, it must
    /// grow by a new fragment at least every `scan_timeout` or the scan fails
    /// with `ScanTimeout`. The capture stream is stopped on every exit path.
    pub async fn scan(&self, device: &dyn CaptureDevice) -> Result<SyncPayload, SyncError> {
        let mut capture = CaptureGuard::new(device.open().await?);
        let mut state = ScanState::new(self.codec.clone());
        let mut deadline: Option<Instant> = None;

        tracing::info!("scan started");

        loop {
            let frame = match deadline {
                Some(at) => match tokio::time::timeout_at(at, capture.next_frame()).await {
                    Ok(frame) => frame,
                    Err(_) => {
                        let (received, total) = state.progress().unwrap_or((0, 0));
                        state.reset();
                        tracing::warn!("scan timed out with {}/{} fragments", received, total);
                        return Err(SyncError::ScanTimeout { received, total });
                    }
                },
                None => capture.next_frame().await,
            };

            let Some(frame) = frame else {
                return Err(SyncError::Capability("capture stream ended".into()));
            };

            match state.feed(&frame) {
                ScanStep::Noise => {}
                ScanStep::Progress { received, total, fresh } => {
                    if fresh {
                        deadline = Some(Instant::now() + self.scan_timeout);
                        tracing::debug!("collected fragment {}/{}", received, total);
                    }
                }
                ScanStep::Decoded(result) => {
                    capture.stop();
                    let payload = result?;
                    tracing::info!("scan complete identity={}", payload.identity.id);
                    return Ok(payload);
                }
            }
        }
    }
}
