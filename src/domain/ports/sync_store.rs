//! Sync Store Port
//!
//! The device-local store a sync attempt applies its result to.

use crate::domain::entities::SyncPayload;
use crate::domain::errors::SyncError;
use crate::domain::ports::{IdentityStore, SnapshotStore};
use async_trait::async_trait;

/// Identity, credential and snapshot storage behind one commit point.
#[async_trait]
pub trait SyncStore: IdentityStore + SnapshotStore {
    /// Sign in `payload.identity`, replace its snapshot and set its
    /// credential as one unit.
    ///
    /// On error the store is left exactly as it was.
    async fn commit(&self, payload: &SyncPayload) -> Result<(), SyncError>;
}
