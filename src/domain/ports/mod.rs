mod byte_codec;
mod capture_device;
mod frame_display;
mod identity_store;
mod rendezvous;
mod snapshot_store;
mod sync_store;

pub use byte_codec::{ByteCompressor, TextCodec};
pub use capture_device::{CaptureDevice, FrameStream};
pub use frame_display::FrameDisplay;
pub use identity_store::IdentityStore;
pub use rendezvous::{PeerChannel, RendezvousBroker};
pub use snapshot_store::SnapshotStore;
pub use sync_store::SyncStore;
