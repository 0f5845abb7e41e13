//! Location repository: placements and closure-table reads.

use sqlx::{SqliteConnection, SqlitePool};

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::{ContentId, LocationId};
use canopy_entity::location::{Location, Path};

use crate::connection::{begin, commit};

/// Repository for locations and the paths between them.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Create a new location repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a location by ID.
    pub async fn find_by_id(&self, id: LocationId) -> AppResult<Option<Location>> {
        sqlx::query_as::<_, Location>("SELECT id, content_id, is_main FROM location WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find location", e))
    }

    /// Find a location by ID or fail with `NotFound`.
    pub async fn get(&self, id: LocationId) -> AppResult<Location> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Location {id} not found")))
    }

    /// All locations of a node, oldest first.
    pub async fn find_by_content(&self, content_id: ContentId) -> AppResult<Vec<Location>> {
        sqlx::query_as::<_, Location>(
            "SELECT id, content_id, is_main FROM location WHERE content_id = ?1 ORDER BY id ASC",
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list locations", e))
    }

    /// Place an existing node at an additional location.
    ///
    /// With `make_main` the new placement becomes the node's main location
    /// and every other placement is demoted.
    pub async fn add_location(
        &self,
        content_id: ContentId,
        parent: Option<LocationId>,
        make_main: bool,
    ) -> AppResult<Location> {
        let mut tx = begin(&self.pool).await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM content WHERE id = ?1")
            .bind(content_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find content", e))?;
        if exists.is_none() {
            return Err(AppError::not_found(format!("Content {content_id} not found")));
        }

        if make_main {
            Self::clear_main_in(&mut tx, content_id, None).await?;
        }
        let location = Self::place_in(&mut tx, content_id, parent, make_main).await?;
        commit(tx).await?;

        tracing::info!(
            content_id = %content_id,
            location_id = %location.id,
            parent = ?parent,
            is_main = make_main,
            "Location added"
        );
        Ok(location)
    }

    /// Closure rows whose descendant is `location`, root first.
    pub async fn paths(&self, location: LocationId) -> AppResult<Vec<Path>> {
        sqlx::query_as::<_, Path>(
            "SELECT ancestor, descendant, length FROM path \
             WHERE descendant = ?1 ORDER BY length DESC",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load paths", e))
    }

    /// The direct parent of `location`, or `None` for a root.
    pub async fn parent(&self, location: LocationId) -> AppResult<Option<Location>> {
        sqlx::query_as::<_, Location>(
            "SELECT l.id, l.content_id, l.is_main FROM path p \
             JOIN location l ON l.id = p.ancestor \
             WHERE p.descendant = ?1 AND p.length = 1",
        )
        .bind(location)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find parent", e))
    }

    /// Every ancestor of `location` from the root down to itself.
    pub async fn lineage(&self, location: LocationId) -> AppResult<Vec<Location>> {
        sqlx::query_as::<_, Location>(
            "SELECT l.id, l.content_id, l.is_main FROM path p \
             JOIN location l ON l.id = p.ancestor \
             WHERE p.descendant = ?1 ORDER BY p.length DESC",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load lineage", e))
    }

    /// Slugs of the lineage of `location`, root first.
    ///
    /// Read from the closure table on every call, so a move is reflected
    /// immediately.
    pub async fn slugs(&self, location: LocationId) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT c.slug FROM path p \
             JOIN location l ON l.id = p.ancestor \
             JOIN content c ON c.id = l.content_id \
             WHERE p.descendant = ?1 ORDER BY p.length DESC",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load slugs", e))
    }

    /// Every location below `location`, nearest first. Excludes `location`.
    pub async fn descendants(&self, location: LocationId) -> AppResult<Vec<Location>> {
        sqlx::query_as::<_, Location>(
            "SELECT l.id, l.content_id, l.is_main FROM path p \
             JOIN location l ON l.id = p.descendant \
             WHERE p.ancestor = ?1 AND p.length > 0 ORDER BY p.length ASC, l.id ASC",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load descendants", e))
    }

    /// Number of closure rows inside the subtree rooted at `location`.
    pub async fn subtree_closure_size(&self, location: LocationId) -> AppResult<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM path WHERE descendant IN \
             (SELECT descendant FROM path WHERE ancestor = ?1)",
        )
        .bind(location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count paths", e))
    }

    /// Find a location by ID on an open connection.
    pub async fn find_by_id_in(
        conn: &mut SqliteConnection,
        id: LocationId,
    ) -> AppResult<Option<Location>> {
        sqlx::query_as::<_, Location>("SELECT id, content_id, is_main FROM location WHERE id = ?1")
            .bind(id)
            .fetch_optional(conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find location", e))
    }

    /// Whether `candidate` lies in the subtree rooted at `root` (inclusive).
    pub async fn is_within_in(
        conn: &mut SqliteConnection,
        root: LocationId,
        candidate: LocationId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM path WHERE ancestor = ?1 AND descendant = ?2)",
        )
        .bind(root)
        .bind(candidate)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check subtree", e))
    }

    /// Insert a location for `content_id` with its closure rows.
    ///
    /// The new location gets its reflexive row plus a copy of every path
    /// ending at `parent`, one level longer.
    pub async fn place_in(
        conn: &mut SqliteConnection,
        content_id: ContentId,
        parent: Option<LocationId>,
        is_main: bool,
    ) -> AppResult<Location> {
        if let Some(parent_id) = parent {
            if Self::find_by_id_in(&mut *conn, parent_id).await?.is_none() {
                return Err(AppError::not_found(format!(
                    "Parent location {parent_id} not found"
                )));
            }
        }

        let location = sqlx::query_as::<_, Location>(
            "INSERT INTO location (content_id, is_main) VALUES (?1, ?2) \
             RETURNING id, content_id, is_main",
        )
        .bind(content_id)
        .bind(is_main)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create location", e))?;

        sqlx::query("INSERT INTO path (ancestor, descendant, length) VALUES (?1, ?1, 0)")
            .bind(location.id)
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create path", e))?;

        if let Some(parent_id) = parent {
            sqlx::query(
                "INSERT INTO path (ancestor, descendant, length) \
                 SELECT ancestor, ?1, length + 1 FROM path WHERE descendant = ?2",
            )
            .bind(location.id)
            .bind(parent_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to copy parent paths", e)
            })?;
        }

        Ok(location)
    }

    /// Demote every main location of `content_id` except `keep`.
    pub async fn clear_main_in(
        conn: &mut SqliteConnection,
        content_id: ContentId,
        keep: Option<LocationId>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE location SET is_main = 0 \
             WHERE content_id = ?1 AND is_main = 1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(content_id)
        .bind(keep)
        .execute(conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to clear main location", e)
        })?;
        Ok(result.rows_affected())
    }
}
