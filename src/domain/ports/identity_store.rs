//! Identity Store Port
//!
//! Supplies and persists the signed-in user and their API credential.

use crate::domain::entities::UserIdentity;
use crate::domain::errors::SyncError;
use async_trait::async_trait;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// The identity signed in on this device, if any.
    async fn current(&self) -> Result<Option<UserIdentity>, SyncError>;

    /// Persist (and sign in) an identity.
    async fn save_identity(&self, identity: &UserIdentity) -> Result<(), SyncError>;

    /// The stored credential for the current identity.
    async fn credential(&self) -> Result<Option<String>, SyncError>;

    async fn save_credential(&self, credential: Option<&str>) -> Result<(), SyncError>;
}
