//! fintrack-sync Library
//!
//! Device-to-device synchronization for a local-first finance tracker:
//! versioned wire codec, visual broadcast and peer transports, and the
//! snapshot merge engine.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod transport;

// Re-export commonly used types
pub use application::{CloneSession, HostedSession, ReceiveInput, SyncAction, SyncReport, SyncService};
pub use codec::{Codec, WireVersion};
pub use config::{load_config, Config};
pub use domain::entities::{
    AccountRecord, ConversationRecord, FinanceSnapshot, HoldingRecord, Settings, SyncPayload,
    TransactionRecord, UserIdentity,
};
pub use domain::errors::{FormatError, SyncError};
pub use domain::ports::{
    ByteCompressor, CaptureDevice, FrameDisplay, FrameStream, IdentityStore, PeerChannel, RendezvousBroker,
    SnapshotStore, SyncStore, TextCodec,
};
pub use domain::services::MergeEngine;
pub use domain::value_objects::{RendezvousLink, SessionId};
pub use transport::{PeerSession, PeerSessionState, SyncConfig, TransportKind, VisualTransport};
