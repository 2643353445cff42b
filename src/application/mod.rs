//! Application Layer
//!
//! Use cases that coordinate the domain, transports and adapters.

mod sync_service;

pub use sync_service::{
    BroadcastSession, CloneSession, HostedSession, ReceiveInput, SyncAction, SyncReport, SyncService,
};
