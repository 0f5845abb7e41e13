//! Content repository: node construction, lookup, and main-location upkeep.

use sqlx::{SqliteConnection, SqlitePool};
use sqlx::types::Json;

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::{ContentId, LocationId};
use canopy_entity::content::{Content, NewContent};
use canopy_entity::location::Location;

use super::location::LocationRepository;
use crate::connection::{begin, commit};

/// Column list of the `content` table, in [`Content`] field order.
pub const CONTENT_COLUMNS: &str = "id, type, name, slug, status, creator_id, attributes";

/// Repository for content nodes.
#[derive(Debug, Clone)]
pub struct ContentRepository {
    pool: SqlitePool,
}

impl ContentRepository {
    /// Create a new content repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a node by ID.
    pub async fn find_by_id(&self, id: ContentId) -> AppResult<Option<Content>> {
        sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find content", e))
    }

    /// Find a node by ID or fail with `NotFound`.
    pub async fn get(&self, id: ContentId) -> AppResult<Content> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Content {id} not found")))
    }

    /// Create a new root node with one main location.
    pub async fn create_root(&self, data: &NewContent) -> AppResult<(Content, Location)> {
        self.create(data, None).await
    }

    /// Create a new node placed under `parent`.
    pub async fn create_child(
        &self,
        parent: LocationId,
        data: &NewContent,
    ) -> AppResult<(Content, Location)> {
        self.create(data, Some(parent)).await
    }

    async fn create(
        &self,
        data: &NewContent,
        parent: Option<LocationId>,
    ) -> AppResult<(Content, Location)> {
        data.validate()?;

        let mut tx = begin(&self.pool).await?;
        let content = Self::insert_in(&mut tx, data).await?;
        let location = LocationRepository::place_in(&mut tx, content.id, parent, true).await?;
        commit(tx).await?;

        tracing::info!(
            content_id = %content.id,
            location_id = %location.id,
            kind = %content.kind,
            parent = ?parent,
            "Content created"
        );
        Ok((content, location))
    }

    /// Insert the `content` row only. Callers must place it afterwards.
    pub async fn insert_in(conn: &mut SqliteConnection, data: &NewContent) -> AppResult<Content> {
        sqlx::query_as::<_, Content>(&format!(
            "INSERT INTO content (type, name, slug, status, creator_id, attributes) \
             VALUES (?1, ?2, ?3, 0, ?4, ?5) RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(data.kind)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(data.creator_id)
        .bind(Json(&data.attributes))
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::not_found(format!(
                    "Creator {} not found",
                    data.creator_id.map(|c| c.to_string()).unwrap_or_default()
                ))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create content", e),
        })
    }

    /// Update the editable display fields.
    pub async fn update(&self, id: ContentId, name: &str, slug: &str) -> AppResult<Content> {
        if name.trim().is_empty() || slug.trim().is_empty() {
            return Err(AppError::validation("Content name and slug cannot be empty"));
        }

        sqlx::query_as::<_, Content>(&format!(
            "UPDATE content SET name = ?2, slug = ?3 WHERE id = ?1 RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update content", e))?
        .ok_or_else(|| AppError::not_found(format!("Content {id} not found")))
    }

    /// Content created by `creator`.
    pub async fn own_content(&self, creator: ContentId) -> AppResult<Vec<Content>> {
        sqlx::query_as::<_, Content>(&format!(
            "SELECT {CONTENT_COLUMNS} FROM content WHERE creator_id = ?1 ORDER BY id ASC"
        ))
        .bind(creator)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list own content", e))
    }

    /// The main location of a node.
    ///
    /// A node without a main location is a data-integrity failure and is
    /// reported as `NoMainLocationFound`; no other location is substituted.
    pub async fn main_location(&self, id: ContentId) -> AppResult<Location> {
        let main = sqlx::query_as::<_, Location>(
            "SELECT id, content_id, is_main FROM location WHERE content_id = ?1 AND is_main = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find main location", e)
        })?;

        match main {
            Some(location) => Ok(location),
            None => {
                self.get(id).await?;
                Err(AppError::no_main_location(format!(
                    "Content {id} has no main location"
                )))
            }
        }
    }

    /// Flag `location` as the main location of `id`, demoting the others.
    ///
    /// A location owned by another node is reassigned to `id` first; the
    /// subtree below it moves along with the placement.
    pub async fn set_main_location(&self, id: ContentId, location: LocationId) -> AppResult<()> {
        let mut tx = begin(&self.pool).await?;

        let target = LocationRepository::find_by_id_in(&mut tx, location)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Location {location} not found")))?;
        let previous_owner = target.content_id;
        if previous_owner != id {
            Self::take_location_in(&mut tx, id, &target).await?;
        }

        LocationRepository::clear_main_in(&mut tx, id, Some(location)).await?;
        sqlx::query("UPDATE location SET is_main = 1 WHERE id = ?1")
            .bind(location)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to set main location", e)
            })?;
        commit(tx).await?;

        tracing::info!(
            content_id = %id,
            location_id = %location,
            previous_owner = %previous_owner,
            "Main location changed"
        );
        Ok(())
    }

    /// Hand `location` over to `id`.
    ///
    /// The previous owner must keep at least one location. If it gave up
    /// its main location, its oldest remaining one becomes main.
    async fn take_location_in(
        conn: &mut SqliteConnection,
        id: ContentId,
        location: &Location,
    ) -> AppResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM content WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find content", e))?;
        if exists.is_none() {
            return Err(AppError::not_found(format!("Content {id} not found")));
        }
        let owner = location.content_id;

        sqlx::query("UPDATE location SET content_id = ?2, is_main = 0 WHERE id = ?1")
            .bind(location.id)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to reassign location", e)
            })?;

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM location WHERE content_id = ?1")
            .bind(owner)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count locations", e)
            })?;
        if remaining == 0 {
            return Err(AppError::integrity(format!(
                "Location {} is the last location of content {owner}",
                location.id
            )));
        }

        if location.is_main {
            sqlx::query(
                "UPDATE location SET is_main = 1 \
                 WHERE id = (SELECT MIN(id) FROM location WHERE content_id = ?1)",
            )
            .bind(owner)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to promote main location", e)
            })?;
        }

        tracing::debug!(location_id = %location.id, from = %owner, to = %id, "Location reassigned");
        Ok(())
    }
}
