//! DashMap Stores
//!
//! In-memory SnapshotStore and IdentityStore using DashMap for lock-free
//! concurrent access, plus `DashMapStore` pairing the two behind SyncStore.

use crate::domain::entities::{FinanceSnapshot, SyncPayload, UserIdentity};
use crate::domain::errors::SyncError;
use crate::domain::ports::{IdentityStore, SnapshotStore, SyncStore};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// DashMap-backed snapshot store.
#[derive(Clone, Default)]
pub struct DashMapSnapshotStore {
    snapshots: Arc<DashMap<String, FinanceSnapshot>>,
}

impl DashMapSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for DashMapSnapshotStore {
    async fn load(&self, identity_id: &str) -> Result<Option<FinanceSnapshot>, SyncError> {
        Ok(self.snapshots.get(identity_id).map(|e| e.value().clone()))
    }

    async fn save(&self, identity_id: &str, snapshot: &FinanceSnapshot) -> Result<(), SyncError> {
        self.snapshots.insert(identity_id.to_string(), snapshot.clone());
        Ok(())
    }
}

/// DashMap-backed identity store.
///
/// Remembers every identity ever signed in; one is current. Credentials are
/// kept per identity.
#[derive(Clone, Default)]
pub struct DashMapIdentityStore {
    identities: Arc<DashMap<String, UserIdentity>>,
    credentials: Arc<DashMap<String, String>>,
    current: Arc<RwLock<Option<String>>>,
}

impl DashMapIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with `identity` already signed in.
    pub fn signed_in(identity: UserIdentity) -> Self {
        let store = Self::default();
        *store.current.write() = Some(identity.id.clone());
        store.identities.insert(identity.id.clone(), identity);
        store
    }

    fn current_id(&self) -> Option<String> {
        self.current.read().clone()
    }
}

#[async_trait]
impl IdentityStore for DashMapIdentityStore {
    async fn current(&self) -> Result<Option<UserIdentity>, SyncError> {
        Ok(self
            .current_id()
            .and_then(|id| self.identities.get(&id).map(|e| e.value().clone())))
    }

    async fn save_identity(&self, identity: &UserIdentity) -> Result<(), SyncError> {
        self.identities.insert(identity.id.clone(), identity.clone());
        *self.current.write() = Some(identity.id.clone());
        Ok(())
    }

    async fn credential(&self) -> Result<Option<String>, SyncError> {
        Ok(self
            .current_id()
            .and_then(|id| self.credentials.get(&id).map(|e| e.value().clone())))
    }

    async fn save_credential(&self, credential: Option<&str>) -> Result<(), SyncError> {
        let id = self
            .current_id()
            .ok_or_else(|| SyncError::Storage("no identity signed in".into()))?;
        match credential {
            Some(c) if !c.is_empty() => {
                self.credentials.insert(id, c.to_string());
            }
            _ => {
                self.credentials.remove(&id);
            }
        }
        Ok(())
    }
}

/// Identity and snapshot maps committed together.
///
/// Clones share state, so the parts stay usable for inspection.
#[derive(Clone, Default)]
pub struct DashMapStore {
    identities: DashMapIdentityStore,
    snapshots: DashMapSnapshotStore,
}

impl DashMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(identities: DashMapIdentityStore, snapshots: DashMapSnapshotStore) -> Self {
        Self { identities, snapshots }
    }

    pub fn identities(&self) -> &DashMapIdentityStore {
        &self.identities
    }

    pub fn snapshots(&self) -> &DashMapSnapshotStore {
        &self.snapshots
    }
}

#[async_trait]
impl SnapshotStore for DashMapStore {
    async fn load(&self, identity_id: &str) -> Result<Option<FinanceSnapshot>, SyncError> {
        self.snapshots.load(identity_id).await
    }

    async fn save(&self, identity_id: &str, snapshot: &FinanceSnapshot) -> Result<(), SyncError> {
        self.snapshots.save(identity_id, snapshot).await
    }
}

#[async_trait]
impl IdentityStore for DashMapStore {
    async fn current(&self) -> Result<Option<UserIdentity>, SyncError> {
        self.identities.current().await
    }

    async fn save_identity(&self, identity: &UserIdentity) -> Result<(), SyncError> {
        self.identities.save_identity(identity).await
    }

    async fn credential(&self) -> Result<Option<String>, SyncError> {
        self.identities.credential().await
    }

    async fn save_credential(&self, credential: Option<&str>) -> Result<(), SyncError> {
        self.identities.save_credential(credential).await
    }
}

#[async_trait]
impl SyncStore for DashMapStore {
    async fn commit(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let id = payload.identity.id.clone();
        if id.is_empty() {
            return Err(SyncError::Storage("payload has no identity id".into()));
        }

        // Hold the current-identity lock so readers see all or nothing
        let mut current = self.identities.current.write();
        self.identities.identities.insert(id.clone(), payload.identity.clone());
        self.snapshots.snapshots.insert(id.clone(), payload.snapshot.clone());
        match payload.credential.as_deref() {
            Some(c) if !c.is_empty() => {
                self.identities.credentials.insert(id.clone(), c.to_string());
            }
            _ => {
                self.identities.credentials.remove(&id);
            }
        }
        *current = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_save_replaces() {
        let store = DashMapSnapshotStore::new();
        assert!(store.load("u1").await.unwrap().is_none());

        let mut snapshot = FinanceSnapshot::new();
        snapshot.transaction_categories = vec!["Food".into()];
        store.save("u1", &snapshot).await.unwrap();

        snapshot.transaction_categories = vec!["Rent".into()];
        store.save("u1", &snapshot).await.unwrap();

        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.transaction_categories, vec!["Rent".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_identity_sign_in_switches_current() {
        let store = DashMapIdentityStore::new();
        assert!(store.current().await.unwrap().is_none());

        store.save_identity(&UserIdentity::new("u1", "Ada")).await.unwrap();
        store.save_credential(Some("sk-1")).await.unwrap();
        store.save_identity(&UserIdentity::new("u2", "Grace")).await.unwrap();

        assert_eq!(store.current().await.unwrap().unwrap().id, "u2");
        assert_eq!(store.credential().await.unwrap(), None);

        store.save_identity(&UserIdentity::new("u1", "Ada")).await.unwrap();
        assert_eq!(store.credential().await.unwrap().as_deref(), Some("sk-1"));
    }

    #[tokio::test]
    async fn test_empty_credential_clears() {
        let store = DashMapIdentityStore::signed_in(UserIdentity::new("u1", "Ada"));
        store.save_credential(Some("sk-1")).await.unwrap();
        store.save_credential(Some("")).await.unwrap();
        assert_eq!(store.credential().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_credential_requires_identity() {
        let store = DashMapIdentityStore::new();
        assert!(matches!(
            store.save_credential(Some("sk")).await,
            Err(SyncError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_signs_in_with_snapshot_and_credential() {
        let store = DashMapStore::from_parts(
            DashMapIdentityStore::signed_in(UserIdentity::new("u2", "Grace")),
            DashMapSnapshotStore::new(),
        );
        let mut snapshot = FinanceSnapshot::new();
        snapshot.transaction_categories = vec!["Food".into()];

        let payload = SyncPayload::new(UserIdentity::new("u1", "Ada"), snapshot.clone(), Some("sk-1".into()));
        store.commit(&payload).await.unwrap();

        assert_eq!(store.current().await.unwrap().unwrap().id, "u1");
        assert_eq!(store.credential().await.unwrap().as_deref(), Some("sk-1"));
        assert_eq!(store.snapshots().load("u1").await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_commit_rejects_missing_identity_untouched() {
        let store = DashMapStore::from_parts(
            DashMapIdentityStore::signed_in(UserIdentity::new("u2", "Grace")),
            DashMapSnapshotStore::new(),
        );

        let payload = SyncPayload::new(UserIdentity::new("", "Nobody"), FinanceSnapshot::new(), None);
        assert!(matches!(store.commit(&payload).await, Err(SyncError::Storage(_))));

        assert_eq!(store.current().await.unwrap().unwrap().id, "u2");
        assert!(store.snapshots().is_empty());
    }
}
