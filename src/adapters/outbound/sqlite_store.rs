//! SQLite Store
//!
//! Implements SnapshotStore, IdentityStore and SyncStore on a single SQLite
//! database file. Snapshots are stored as one JSON document per identity, so
//! a save replaces the whole snapshot in one statement; a commit wraps the
//! identity switch, snapshot and credential in one transaction.

use crate::domain::entities::{FinanceSnapshot, SyncPayload, UserIdentity};
use crate::domain::errors::SyncError;
use crate::domain::ports::{IdentityStore, SnapshotStore, SyncStore};
use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    identity_id  TEXT PRIMARY KEY,
    data         TEXT NOT NULL,
    last_updated INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS identities (
    id      TEXT PRIMARY KEY,
    name    TEXT NOT NULL,
    email   TEXT,
    current INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS credentials (
    identity_id TEXT PRIMARY KEY,
    credential  TEXT NOT NULL
);
";

/// SQLite-backed store.
///
/// Each operation opens its own connection on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store
            .with_conn(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        tracing::info!("sqlite store ready path={}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            f(&mut conn)
        })
        .await?
    }

    fn load_snapshot(conn: &Connection, identity_id: &str) -> Result<Option<FinanceSnapshot>> {
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM snapshots WHERE identity_id = ?1",
                params![identity_id],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn sign_in(tx: &Transaction<'_>, identity: &UserIdentity) -> Result<()> {
        tx.execute("UPDATE identities SET current = 0 WHERE current = 1", [])?;
        tx.execute(
            "INSERT INTO identities (id, name, email, current) VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                 email = excluded.email, current = 1",
            params![identity.id, identity.name, identity.email],
        )?;
        Ok(())
    }

    fn write_snapshot(conn: &Connection, identity_id: &str, data: &str, last_updated: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO snapshots (identity_id, data, last_updated) VALUES (?1, ?2, ?3)
             ON CONFLICT(identity_id) DO UPDATE SET data = excluded.data,
                 last_updated = excluded.last_updated",
            params![identity_id, data, last_updated],
        )?;
        Ok(())
    }

    fn write_credential(conn: &Connection, identity_id: &str, credential: Option<&str>) -> Result<()> {
        match credential {
            Some(c) => conn.execute(
                "INSERT INTO credentials (identity_id, credential) VALUES (?1, ?2)
                 ON CONFLICT(identity_id) DO UPDATE SET credential = excluded.credential",
                params![identity_id, c],
            )?,
            None => conn.execute(
                "DELETE FROM credentials WHERE identity_id = ?1",
                params![identity_id],
            )?,
        };
        Ok(())
    }

    fn current_identity(conn: &Connection) -> Result<Option<UserIdentity>> {
        let identity = conn
            .query_row(
                "SELECT id, name, email FROM identities WHERE current = 1 LIMIT 1",
                [],
                |row| {
                    Ok(UserIdentity {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(identity)
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn load(&self, identity_id: &str) -> Result<Option<FinanceSnapshot>, SyncError> {
        let identity_id = identity_id.to_string();
        self.with_conn(move |conn| Self::load_snapshot(conn, &identity_id))
            .await
            .map_err(SyncError::storage)
    }

    async fn save(&self, identity_id: &str, snapshot: &FinanceSnapshot) -> Result<(), SyncError> {
        let identity_id = identity_id.to_string();
        let data = serde_json::to_string(snapshot).map_err(SyncError::storage)?;
        let last_updated = snapshot.last_updated;

        self.with_conn(move |conn| Self::write_snapshot(conn, &identity_id, &data, last_updated))
        .await
        .map_err(SyncError::storage)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn current(&self) -> Result<Option<UserIdentity>, SyncError> {
        self.with_conn(|conn| Self::current_identity(conn))
            .await
            .map_err(SyncError::storage)
    }

    async fn save_identity(&self, identity: &UserIdentity) -> Result<(), SyncError> {
        let identity = identity.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            Self::sign_in(&tx, &identity)?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(SyncError::storage)
    }

    async fn credential(&self) -> Result<Option<String>, SyncError> {
        self.with_conn(|conn| {
            let credential = conn
                .query_row(
                    "SELECT c.credential FROM credentials c
                     JOIN identities i ON i.id = c.identity_id
                     WHERE i.current = 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(credential)
        })
        .await
        .map_err(SyncError::storage)
    }

    async fn save_credential(&self, credential: Option<&str>) -> Result<(), SyncError> {
        let credential = credential.filter(|c| !c.is_empty()).map(str::to_string);
        self.with_conn(move |conn| {
            let identity = Self::current_identity(conn)?
                .ok_or_else(|| anyhow::anyhow!("no identity signed in"))?;
            Self::write_credential(conn, &identity.id, credential.as_deref())
        })
        .await
        .map_err(SyncError::storage)
    }
}

#[async_trait]
impl SyncStore for SqliteStore {
    async fn commit(&self, payload: &SyncPayload) -> Result<(), SyncError> {
        let identity = payload.identity.clone();
        let data = serde_json::to_string(&payload.snapshot).map_err(SyncError::storage)?;
        let last_updated = payload.snapshot.last_updated;
        let credential = payload.credential.clone().filter(|c| !c.is_empty());

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            Self::sign_in(&tx, &identity)?;
            Self::write_snapshot(&tx, &identity.id, &data, last_updated)?;
            Self::write_credential(&tx, &identity.id, credential.as_deref())?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(SyncError::storage)?;

        tracing::debug!("sqlite commit identity={}", payload.identity.id);
        Ok(())
    }
}
