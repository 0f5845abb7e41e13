//! Shared write lock and revision counter for the tree.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use canopy_core::error::AppError;
use canopy_core::result::AppResult;

/// Serializes structural writes and counts them.
///
/// The revision moves forward after every bulk mutation. A caller that
/// captured a revision before such a mutation holds stale rows.
#[derive(Debug, Default)]
pub struct TreeState {
    write_lock: Mutex<()>,
    revision: AtomicU64,
}

impl TreeState {
    /// Creates a fresh state at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the closure table.
    pub async fn write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// The current revision.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Marks every previously loaded row as stale. Returns the new revision.
    pub fn bump(&self) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(revision, "Tree revision advanced");
        revision
    }

    /// Fails with `ConcurrentModification` when `seen` is behind.
    pub fn ensure_current(&self, seen: u64) -> AppResult<()> {
        let current = self.revision();
        if seen != current {
            return Err(AppError::stale(format!(
                "Rows loaded at revision {seen} are stale; the tree is at revision {current}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::ErrorKind;

    #[test]
    fn test_bump_makes_old_revision_stale() {
        let state = TreeState::new();
        let seen = state.revision();
        assert!(state.ensure_current(seen).is_ok());

        state.bump();
        let err = state.ensure_current(seen).unwrap_err();
        assert!(err.is(ErrorKind::ConcurrentModification));
        assert!(state.ensure_current(seen + 1).is_ok());
    }

    #[tokio::test]
    async fn test_write_lock_is_exclusive() {
        let state = TreeState::new();
        let guard = state.write().await;
        assert!(state.write_lock.try_lock().is_err());
        drop(guard);
        assert!(state.write_lock.try_lock().is_ok());
    }
}
