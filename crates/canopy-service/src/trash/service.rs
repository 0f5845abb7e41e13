//! Trash lifecycle.
//!
//! `Available -> Trashed -> PendingDeletion -> deleted`, with
//! `Trashed -> Available` on restore. A hard insert goes straight from
//! `Available` to `PendingDeletion`.

use std::sync::Arc;

use canopy_core::result::AppResult;
use canopy_core::ContentId;
use canopy_database::repositories::{DeleteOutcome, TrashRepository};
use canopy_entity::trash::{TrashItem, TrashRecord};

use crate::cache::ContentCache;
use crate::state::TreeState;

/// Soft delete for content.
///
/// Every transition touches many rows at once, so each one advances the
/// tree revision and clears the content cache.
#[derive(Debug, Clone)]
pub struct TrashService {
    /// Trash repository.
    repo: Arc<TrashRepository>,
    /// Shared write lock and revision.
    state: Arc<TreeState>,
    /// Content cache to clear after transitions.
    cache: ContentCache,
}

impl TrashService {
    /// Creates a new trash service.
    pub fn new(repo: Arc<TrashRepository>, state: Arc<TreeState>, cache: ContentCache) -> Self {
        Self { repo, state, cache }
    }

    /// Trash `target` and its available descendants so they can be
    /// restored later.
    pub async fn insert(&self, target: ContentId) -> AppResult<u64> {
        self.insert_with(target, true).await
    }

    /// Trash `target` and its available descendants.
    ///
    /// With `soft = false` no record is kept and the nodes go straight to
    /// pending deletion.
    pub async fn insert_with(&self, target: ContentId, soft: bool) -> AppResult<u64> {
        let _guard = self.state.write().await;
        let changed = self.repo.insert(target, soft).await?;
        self.after_write();
        Ok(changed)
    }

    /// Restore `target` and every trashed node below it.
    pub async fn restore(&self, target: ContentId) -> AppResult<u64> {
        self.restore_with(target, true).await
    }

    /// Restore `target`, and its trashed descendants when `with_children`
    /// is set.
    pub async fn restore_with(&self, target: ContentId, with_children: bool) -> AppResult<u64> {
        let _guard = self.state.write().await;
        let restored = self.repo.restore(target, with_children).await?;
        self.after_write();
        Ok(restored)
    }

    /// Make the current trash irreversible. Content is removed later by
    /// [`permanently_empty`](Self::permanently_empty).
    pub async fn empty(&self) -> AppResult<u64> {
        let _guard = self.state.write().await;
        let marked = self.repo.empty().await?;
        self.after_write();
        Ok(marked)
    }

    /// Physically delete everything pending deletion.
    pub async fn permanently_empty(&self) -> AppResult<DeleteOutcome> {
        let _guard = self.state.write().await;
        let outcome = self.repo.permanently_empty().await?;
        self.after_write();
        Ok(outcome)
    }

    /// Number of restorable entries.
    pub async fn count(&self) -> AppResult<i64> {
        self.repo.count().await
    }

    /// Restorable entries, newest first.
    pub async fn items(&self) -> AppResult<Vec<TrashItem>> {
        self.repo.items().await
    }

    /// The trash record of `content`, if it is restorable.
    pub async fn record(&self, content: ContentId) -> AppResult<Option<TrashRecord>> {
        self.repo.record(content).await
    }

    fn after_write(&self) {
        self.state.bump();
        self.cache.invalidate_all();
    }
}
