//! Structural mutations of the closure table.
//!
//! Every operation here is a handful of set-based statements executed on a
//! single connection. The `*_in` variants run inside a caller-owned
//! transaction; the others open and commit their own.
//!
//! Deletes first collect the doomed locations into the connection-local
//! `temp.doomed_location` table and work from there, so no statement binds
//! one parameter per row.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::{ContentId, LocationId};
use canopy_entity::ContentStatus;

use super::location::LocationRepository;
use crate::connection::{begin, commit};

/// Rows touched by a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Paths removed because they crossed into the subtree from outside.
    pub paths_detached: u64,
    /// Paths inserted to join the new ancestors to the subtree.
    pub paths_attached: u64,
}

/// Rows removed by a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Locations removed (their paths cascade).
    pub locations_removed: u64,
    /// Nodes removed because no location was left for them.
    pub contents_removed: u64,
}

/// Which subtrees a delete starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubtreeRoots {
    /// A single location.
    Location(LocationId),
    /// Every location of a node.
    ContentLocations(ContentId),
}

impl SubtreeRoots {
    /// Append `SELECT descendant ...` yielding every location to delete.
    fn push_descendants(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match *self {
            Self::Location(id) => {
                qb.push("SELECT descendant FROM path WHERE ancestor = ");
                qb.push_bind(id);
            }
            Self::ContentLocations(id) => {
                qb.push(
                    "SELECT p.descendant FROM path p \
                     JOIN location a ON a.id = p.ancestor WHERE a.content_id = ",
                );
                qb.push_bind(id);
            }
        }
    }
}

/// Repository for moves and deletes of whole subtrees.
#[derive(Debug, Clone)]
pub struct TreeRepository {
    pool: SqlitePool,
}

impl TreeRepository {
    /// Create a new tree repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Move the subtree rooted at `subject` under `new_parent`.
    pub async fn move_subtree(
        &self,
        subject: LocationId,
        new_parent: LocationId,
    ) -> AppResult<MoveOutcome> {
        let mut tx = begin(&self.pool).await?;
        let outcome = Self::move_subtree_in(&mut tx, subject, new_parent).await?;
        commit(tx).await?;
        Ok(outcome)
    }

    /// Move the subtree rooted at `subject` under `new_parent` on an open
    /// connection.
    ///
    /// Rejects moving a location under itself or one of its descendants,
    /// which would create a cycle in the closure table.
    pub async fn move_subtree_in(
        conn: &mut SqliteConnection,
        subject: LocationId,
        new_parent: LocationId,
    ) -> AppResult<MoveOutcome> {
        if LocationRepository::find_by_id_in(&mut *conn, subject).await?.is_none() {
            return Err(AppError::not_found(format!("Location {subject} not found")));
        }
        if LocationRepository::find_by_id_in(&mut *conn, new_parent).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Target location {new_parent} not found"
            )));
        }
        if LocationRepository::is_within_in(&mut *conn, subject, new_parent).await? {
            tracing::warn!(
                subject = %subject,
                new_parent = %new_parent,
                "Rejected move into own subtree"
            );
            return Err(AppError::integrity(format!(
                "Cannot move location {subject} under {new_parent}: target is inside the moved subtree"
            )));
        }

        let detached = sqlx::query(
            "DELETE FROM path \
             WHERE descendant IN (SELECT descendant FROM path WHERE ancestor = ?1) \
             AND ancestor NOT IN (SELECT descendant FROM path WHERE ancestor = ?1)",
        )
        .bind(subject)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to detach subtree", e))?
        .rows_affected();

        let attached = sqlx::query(
            "INSERT INTO path (ancestor, descendant, length) \
             SELECT supertree.ancestor, subtree.descendant, supertree.length + subtree.length + 1 \
             FROM path AS supertree \
             JOIN path AS subtree ON subtree.ancestor = ?1 \
             WHERE supertree.descendant = ?2",
        )
        .bind(subject)
        .bind(new_parent)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to attach subtree", e))?
        .rows_affected();

        tracing::info!(
            subject = %subject,
            new_parent = %new_parent,
            paths_detached = detached,
            paths_attached = attached,
            "Subtree moved"
        );

        Ok(MoveOutcome {
            paths_detached: detached,
            paths_attached: attached,
        })
    }

    /// Delete the location subtree rooted at `location` and every node left
    /// without a location.
    pub async fn delete_location(&self, location: LocationId) -> AppResult<DeleteOutcome> {
        let mut tx = begin(&self.pool).await?;
        if LocationRepository::find_by_id_in(&mut tx, location).await?.is_none() {
            return Err(AppError::not_found(format!("Location {location} not found")));
        }
        let outcome = Self::delete_subtrees_in(&mut tx, SubtreeRoots::Location(location)).await?;
        commit(tx).await?;

        tracing::info!(
            location_id = %location,
            locations_removed = outcome.locations_removed,
            contents_removed = outcome.contents_removed,
            "Location subtree deleted"
        );
        Ok(outcome)
    }

    /// Delete a node together with everything reachable only through its
    /// locations.
    ///
    /// Nodes with another placement outside the deleted subtrees survive.
    pub async fn delete_content(&self, content: ContentId) -> AppResult<DeleteOutcome> {
        let mut tx = begin(&self.pool).await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM content WHERE id = ?1")
            .bind(content)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find content", e))?;
        if exists.is_none() {
            return Err(AppError::not_found(format!("Content {content} not found")));
        }

        let mut outcome =
            Self::delete_subtrees_in(&mut tx, SubtreeRoots::ContentLocations(content)).await?;

        // A node that had lost all its locations before the delete is still
        // removed explicitly.
        let leftover = sqlx::query("DELETE FROM content WHERE id = ?1")
            .bind(content)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete content", e))?
            .rows_affected();
        outcome.contents_removed += leftover;
        commit(tx).await?;

        tracing::info!(
            content_id = %content,
            locations_removed = outcome.locations_removed,
            contents_removed = outcome.contents_removed,
            "Content subtree deleted"
        );
        Ok(outcome)
    }

    /// Physically remove every node pending deletion.
    ///
    /// Only pending nodes go: their locations and paths cascade with them.
    /// A node below a pending one that is not pending itself survives,
    /// re-linked to its nearest surviving ancestor, or as a root when no
    /// ancestor survives.
    pub async fn purge_pending_in(conn: &mut SqliteConnection) -> AppResult<DeleteOutcome> {
        Self::reset_doomed_in(&mut *conn).await?;

        let locations_removed = sqlx::query(
            "INSERT INTO temp.doomed_location (id, content_id) \
             SELECT l.id, l.content_id FROM location l \
             JOIN content c ON c.id = l.content_id WHERE c.status = ?1",
        )
        .bind(ContentStatus::PendingDeletion)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to collect pending locations", e)
        })?
        .rows_affected();

        // Paths that crossed a doomed location lose one edge per location
        // skipped; the rows themselves already link the survivors.
        let relinked = sqlx::query(
            "UPDATE path SET length = length - (\
                 SELECT COUNT(*) FROM temp.doomed_location d \
                 JOIN path up ON up.ancestor = path.ancestor AND up.descendant = d.id \
                 JOIN path down ON down.ancestor = d.id AND down.descendant = path.descendant) \
             WHERE ancestor NOT IN (SELECT id FROM temp.doomed_location) \
             AND descendant NOT IN (SELECT id FROM temp.doomed_location) \
             AND descendant IN (SELECT p.descendant FROM path p \
                 JOIN temp.doomed_location d ON d.id = p.ancestor)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to re-link survivors", e))?
        .rows_affected();

        let contents_removed = sqlx::query("DELETE FROM content WHERE status = ?1")
            .bind(ContentStatus::PendingDeletion)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge content", e))?
            .rows_affected();

        Self::reset_doomed_in(&mut *conn).await?;

        if relinked > 0 {
            tracing::debug!(relinked, "Paths shortened past purged locations");
        }
        Ok(DeleteOutcome {
            locations_removed,
            contents_removed,
        })
    }

    /// Delete the selected location subtrees, then sweep orphaned nodes and
    /// re-elect a main location for survivors that lost theirs.
    async fn delete_subtrees_in(
        conn: &mut SqliteConnection,
        roots: SubtreeRoots,
    ) -> AppResult<DeleteOutcome> {
        Self::reset_doomed_in(&mut *conn).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT OR IGNORE INTO temp.doomed_location (id, content_id) \
             SELECT id, content_id FROM location WHERE id IN (",
        );
        roots.push_descendants(&mut qb);
        qb.push(")");
        qb.build()
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to collect subtree", e)
            })?;

        let locations_removed = sqlx::query(
            "DELETE FROM location WHERE id IN (SELECT id FROM temp.doomed_location)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete locations", e))?
        .rows_affected();

        let contents_removed = if locations_removed == 0 {
            0
        } else {
            let removed = Self::sweep_orphans_in(&mut *conn).await?;
            Self::promote_main_in(&mut *conn).await?;
            removed
        };

        Self::reset_doomed_in(&mut *conn).await?;
        Ok(DeleteOutcome {
            locations_removed,
            contents_removed,
        })
    }

    /// Create the scratch table on first use and empty it.
    async fn reset_doomed_in(conn: &mut SqliteConnection) -> AppResult<()> {
        sqlx::query(
            "CREATE TEMP TABLE IF NOT EXISTS doomed_location (\
             id INTEGER PRIMARY KEY, content_id INTEGER NOT NULL)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create scratch table", e))?;

        sqlx::query("DELETE FROM temp.doomed_location")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to clear scratch table", e)
            })?;
        Ok(())
    }

    /// Delete nodes that owned a doomed location and have none left.
    async fn sweep_orphans_in(conn: &mut SqliteConnection) -> AppResult<u64> {
        let removed = sqlx::query(
            "DELETE FROM content \
             WHERE id IN (SELECT content_id FROM temp.doomed_location) \
             AND NOT EXISTS (SELECT 1 FROM location WHERE location.content_id = content.id)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete orphaned content", e)
        })?
        .rows_affected();
        Ok(removed)
    }

    /// Give each surviving owner of a doomed location that has no main
    /// location left its oldest location as main.
    async fn promote_main_in(conn: &mut SqliteConnection) -> AppResult<u64> {
        let promoted = sqlx::query(
            "UPDATE location SET is_main = 1 WHERE id IN (\
             SELECT MIN(id) FROM location \
             WHERE content_id IN (SELECT content_id FROM temp.doomed_location) \
             GROUP BY content_id HAVING MAX(is_main) = 0)",
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to promote main location", e)
        })?
        .rows_affected();

        if promoted > 0 {
            tracing::info!(promoted, "Main location re-elected after delete");
        }
        Ok(promoted)
    }
}
