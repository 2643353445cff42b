mod base64_text;
mod channel_frames;
mod dashmap_store;
mod lz4_compressor;
mod memory_rendezvous;
mod sqlite_store;
mod stream_peer_channel;
mod terminal_frames;

pub use base64_text::Base64Text;
pub use channel_frames::{ChannelCaptureDevice, ChannelFrameDisplay};
pub use dashmap_store::{DashMapIdentityStore, DashMapSnapshotStore, DashMapStore};
pub use lz4_compressor::Lz4Compressor;
pub use memory_rendezvous::MemoryRendezvous;
pub use sqlite_store::SqliteStore;
pub use stream_peer_channel::{encode_frame, StreamPeerChannel, MAX_MESSAGE_SIZE};
pub use terminal_frames::{LineCaptureDevice, StdoutFrameDisplay};
