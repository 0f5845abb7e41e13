//! Trash repository: status transitions over whole subtrees.
//!
//! A node's subtree is every node placed under any of its locations,
//! the node itself included.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::ContentId;
use canopy_entity::content::{Content, ContentStatus};
use canopy_entity::trash::{TrashItem, TrashRecord};

use super::tree::{DeleteOutcome, TreeRepository};
use crate::connection::{begin, commit};

/// Content ids in the subtree of the node bound as `?1`.
const SUBTREE_CONTENT: &str = "SELECT dl.content_id FROM location al \
     JOIN path p ON p.ancestor = al.id \
     JOIN location dl ON dl.id = p.descendant \
     WHERE al.content_id = ?1";

#[derive(Debug, FromRow)]
struct TrashRow {
    trashed_at: DateTime<Utc>,
    #[sqlx(flatten)]
    content: Content,
}

/// Repository for trash records and status transitions.
#[derive(Debug, Clone)]
pub struct TrashRepository {
    pool: SqlitePool,
}

impl TrashRepository {
    /// Create a new trash repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Move the available part of `target`'s subtree to the trash.
    ///
    /// A soft insert records each node so it can be restored. A hard insert
    /// marks the nodes pending deletion without any record. Returns the
    /// number of nodes whose status changed.
    pub async fn insert(&self, target: ContentId, soft: bool) -> AppResult<u64> {
        let mut tx = begin(&self.pool).await?;
        Self::ensure_exists_in(&mut tx, target).await?;

        let changed = if soft {
            sqlx::query(&format!(
                "INSERT INTO trash (content_id, created_at) \
                 SELECT id, ?2 FROM content WHERE status = ?3 AND id IN ({SUBTREE_CONTENT}) \
                 ON CONFLICT(content_id) DO NOTHING"
            ))
            .bind(target)
            .bind(Utc::now())
            .bind(ContentStatus::Available)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to insert trash records", e)
            })?;

            Self::set_subtree_status_in(
                &mut tx,
                target,
                ContentStatus::Available,
                ContentStatus::Trashed,
            )
            .await?
        } else {
            Self::set_subtree_status_in(
                &mut tx,
                target,
                ContentStatus::Available,
                ContentStatus::PendingDeletion,
            )
            .await?
        };
        commit(tx).await?;

        tracing::info!(content_id = %target, soft, changed, "Subtree moved to trash");
        Ok(changed)
    }

    /// Restore `target` from the trash.
    ///
    /// With `with_children` every trashed node in the subtree comes back.
    /// Without it only `target` is restored and its descendants stay in
    /// the trash.
    pub async fn restore(&self, target: ContentId, with_children: bool) -> AppResult<u64> {
        let mut tx = begin(&self.pool).await?;
        Self::ensure_exists_in(&mut tx, target).await?;

        let restored = if with_children {
            sqlx::query(&format!(
                "DELETE FROM trash WHERE content_id IN ({SUBTREE_CONTENT})"
            ))
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete trash records", e)
            })?;

            Self::set_subtree_status_in(
                &mut tx,
                target,
                ContentStatus::Trashed,
                ContentStatus::Available,
            )
            .await?
        } else {
            let removed = sqlx::query("DELETE FROM trash WHERE content_id = ?1")
                .bind(target)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to delete trash record", e)
                })?
                .rows_affected();
            if removed == 0 {
                return Err(AppError::not_found(format!(
                    "Content {target} is not in the trash"
                )));
            }

            sqlx::query("UPDATE content SET status = ?2 WHERE id = ?1")
                .bind(target)
                .bind(ContentStatus::Available)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to restore content", e)
                })?
                .rows_affected()
        };
        commit(tx).await?;

        tracing::info!(content_id = %target, with_children, restored, "Restored from trash");
        Ok(restored)
    }

    /// Make everything in the trash irreversible.
    ///
    /// Trashed nodes become pending deletion and every record is removed.
    /// Nothing is physically deleted here.
    pub async fn empty(&self) -> AppResult<u64> {
        let mut tx = begin(&self.pool).await?;

        let marked = sqlx::query("UPDATE content SET status = ?2 WHERE status = ?1")
            .bind(ContentStatus::Trashed)
            .bind(ContentStatus::PendingDeletion)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to empty trash", e))?
            .rows_affected();

        sqlx::query("DELETE FROM trash")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete trash records", e)
            })?;
        commit(tx).await?;

        tracing::info!(marked, "Trash emptied");
        Ok(marked)
    }

    /// Physically delete every node pending deletion.
    pub async fn permanently_empty(&self) -> AppResult<DeleteOutcome> {
        let mut tx = begin(&self.pool).await?;
        let outcome = TreeRepository::purge_pending_in(&mut tx).await?;
        commit(tx).await?;

        tracing::info!(
            locations_removed = outcome.locations_removed,
            contents_removed = outcome.contents_removed,
            "Pending content purged"
        );
        Ok(outcome)
    }

    /// Number of restorable entries. Pending deletions are not counted.
    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM trash t JOIN content c ON c.id = t.content_id \
             WHERE c.status = ?1",
        )
        .bind(ContentStatus::Trashed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count trash", e))
    }

    /// The trash record of a node, if it has one.
    pub async fn record(&self, content: ContentId) -> AppResult<Option<TrashRecord>> {
        sqlx::query_as::<_, TrashRecord>(
            "SELECT content_id, created_at FROM trash WHERE content_id = ?1",
        )
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find trash record", e))
    }

    /// Restorable entries, newest first, with the slugs of each node's main
    /// lineage loaded in one extra query.
    pub async fn items(&self) -> AppResult<Vec<TrashItem>> {
        let rows = sqlx::query_as::<_, TrashRow>(
            "SELECT t.created_at AS trashed_at, \
             c.id, c.type, c.name, c.slug, c.status, c.creator_id, c.attributes \
             FROM trash t JOIN content c ON c.id = t.content_id \
             WHERE c.status = ?1 \
             ORDER BY t.created_at DESC, t.content_id DESC",
        )
        .bind(ContentStatus::Trashed)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trash", e))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Slugs of every trashed node's main lineage, root first.
        let pairs: Vec<(ContentId, String)> = sqlx::query_as(
            "SELECT ml.content_id, c.slug FROM trash t \
             JOIN content tc ON tc.id = t.content_id \
             JOIN location ml ON ml.content_id = t.content_id AND ml.is_main = 1 \
             JOIN path p ON p.descendant = ml.id \
             JOIN location al ON al.id = p.ancestor \
             JOIN content c ON c.id = al.content_id \
             WHERE tc.status = ?1 \
             ORDER BY ml.content_id, p.length DESC",
        )
        .bind(ContentStatus::Trashed)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load slugs", e))?;

        let mut slugs: HashMap<ContentId, Vec<String>> = HashMap::new();
        for (owner, slug) in pairs {
            slugs.entry(owner).or_default().push(slug);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.content.id;
                TrashItem {
                    record: TrashRecord {
                        content_id: id,
                        created_at: row.trashed_at,
                    },
                    slugs: slugs.remove(&id).unwrap_or_default(),
                    content: row.content,
                }
            })
            .collect())
    }

    async fn ensure_exists_in(conn: &mut SqliteConnection, id: ContentId) -> AppResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM content WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find content", e))?;
        match exists {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(format!("Content {id} not found"))),
        }
    }

    async fn set_subtree_status_in(
        conn: &mut SqliteConnection,
        target: ContentId,
        from: ContentStatus,
        to: ContentStatus,
    ) -> AppResult<u64> {
        let result = sqlx::query(&format!(
            "UPDATE content SET status = ?3 WHERE status = ?2 AND id IN ({SUBTREE_CONTENT})"
        ))
        .bind(target)
        .bind(from)
        .bind(to)
        .execute(conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update subtree status", e)
        })?;
        Ok(result.rows_affected())
    }
}
