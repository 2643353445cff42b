//! Sync Errors
//!
//! Error taxonomy surfaced by the codec and the transports.

/// Malformed or unrecognized wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("unrecognized payload tag")]
    UnknownTag,
    #[error("invalid text encoding: {0}")]
    Text(String),
    #[error("decompression failed: {0}")]
    Decompress(String),
    #[error("malformed structure: {0}")]
    Structure(String),
    #[error("invalid payload: {0}")]
    Invalid(String),
    #[error("malformed multipart frame: {0}")]
    Envelope(String),
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self {
        FormatError::Structure(e.to_string())
    }
}

/// Errors surfaced to the caller of a sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("multipart scan timed out ({received}/{total} fragments)")]
    ScanTimeout { received: usize, total: usize },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("capture device unavailable: {0}")]
    Capability(String),
    #[error("payload too large: {fragments} fragments exceeds limit of {limit}")]
    Capacity { fragments: usize, limit: usize },
    #[error("another sync attempt is already active")]
    SessionBusy,
    #[error("sync attempt cancelled")]
    Cancelled,
    #[error("storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Whether the UI should offer a retry affordance.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::ScanTimeout { .. } | SyncError::Connection(_))
    }

    pub fn connection(e: impl std::fmt::Display) -> Self {
        SyncError::Connection(e.to_string())
    }

    pub fn storage(e: impl std::fmt::Display) -> Self {
        SyncError::Storage(e.to_string())
    }
}
