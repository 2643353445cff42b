//! Sync Transport Configuration
//!
//! Tunables shared by the broadcast and duplex transports.

use serde::Deserialize;
use std::time::Duration;

/// Which transport strategy a sync attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One-way cycling visual codes
    Broadcast,
    /// Two-way interactive peer channel
    Duplex,
}

impl TransportKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "broadcast" | "visual" | "qr" => Some(Self::Broadcast),
            "duplex" | "peer" => Some(Self::Duplex),
            _ => None,
        }
    }
}

/// Configuration for sync transports.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Origin used to build rendezvous links (e.g., "https://fintrack.app")
    pub origin: String,

    /// Transport used by `start_clone` (default: Broadcast)
    pub transport: TransportKind,

    /// Maximum characters carried by one visual frame (default: 800)
    pub max_fragment_size: usize,

    /// Maximum number of frames in one broadcast (default: 99)
    pub max_fragments: usize,

    /// Interval between displayed frames (default: 250ms)
    pub frame_interval: Duration,

    /// Multipart collection window, restarted on every new fragment (default: 4s)
    pub scan_timeout: Duration,

    /// Delay before closing a channel after the last send (default: 1s)
    pub close_grace: Duration,

    /// Bound on waiting for a peer channel to open (default: 30s)
    pub connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            transport: TransportKind::Broadcast,
            max_fragment_size: 800,
            max_fragments: 99,
            frame_interval: Duration::from_millis(250),
            scan_timeout: Duration::from_secs(4),
            close_grace: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with an origin.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Default::default()
        }
    }

    /// Set the transport strategy.
    pub fn transport(mut self, kind: TransportKind) -> Self {
        self.transport = kind;
        self
    }

    /// Set the per-frame capacity.
    pub fn max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size;
        self
    }

    /// Set the frame count limit.
    pub fn max_fragments(mut self, count: usize) -> Self {
        self.max_fragments = count;
        self
    }

    /// Set the frame cycling interval.
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Set the multipart scan timeout.
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the close grace period.
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.is_empty() {
            return Err(ConfigError::MissingOrigin);
        }
        if self.max_fragment_size == 0 {
            return Err(ConfigError::ZeroFragmentSize);
        }
        if self.max_fragments == 0 {
            return Err(ConfigError::ZeroFragmentLimit);
        }
        if self.frame_interval.is_zero() || self.scan_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("origin is required")]
    MissingOrigin,
    #[error("max_fragment_size must be positive")]
    ZeroFragmentSize,
    #[error("max_fragments must be positive")]
    ZeroFragmentLimit,
    #[error("frame_interval and scan_timeout must be positive")]
    ZeroInterval,
}
