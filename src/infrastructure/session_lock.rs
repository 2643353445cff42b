//! Sync Session Lock
//!
//! Allows at most one sync attempt per device. A second attempt while one is
//! active is rejected, not queued.

use crate::domain::errors::SyncError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exclusive lock over the device's sync machinery.
#[derive(Clone, Default)]
pub struct SessionLock {
    held: Arc<AtomicBool>,
}

impl SessionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or fail with `SessionBusy`.
    pub fn try_acquire(&self) -> Result<SessionGuard, SyncError> {
        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("sync attempt rejected: session already active");
            return Err(SyncError::SessionBusy);
        }
        tracing::debug!("sync session lock acquired");
        Ok(SessionGuard {
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

/// RAII guard releasing the session lock on drop.
#[derive(Debug)]
pub struct SessionGuard {
    held: Arc<AtomicBool>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
        tracing::debug!("sync session lock released");
    }
}
