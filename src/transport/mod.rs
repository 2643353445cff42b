//! Sync Transports
//!
//! Moves an encoded sync payload between two devices.
//!
//! ## Strategies
//!
//! - **Broadcast** (`visual`): one-way, no network. The sender cycles the
//!   fragments of the wire string as visual codes; the receiver scans and
//!   reassembles them. Built on the Sans-IO `chunker`.
//! - **Duplex** (`peer`): two-way, meets through a rendezvous broker. Used for
//!   clone and for the bidirectional merge flow.

pub mod chunker;
pub mod config;
pub mod peer;
pub mod visual;

pub use chunker::{ChunkEnvelope, Chunker, IngestOutcome, Reassembler, MULTIPART_TAG};
pub use config::{ConfigError, SyncConfig, TransportKind};
pub use peer::{CancelHandle, PeerFlow, PeerOutcome, PeerRole, PeerSession, PeerSessionState};
pub use visual::{BroadcastHandle, ScanState, ScanStep, VisualTransport};
