//! Snapshot Store Port
//!
//! Defines the interface to the local persistent store of finance snapshots.

use crate::domain::entities::FinanceSnapshot;
use crate::domain::errors::SyncError;
use async_trait::async_trait;

/// Repository of snapshots keyed by identity id.
///
/// `save` replaces the stored snapshot atomically; readers never observe a
/// partially written snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, identity_id: &str) -> Result<Option<FinanceSnapshot>, SyncError>;

    async fn save(&self, identity_id: &str, snapshot: &FinanceSnapshot) -> Result<(), SyncError>;
}
