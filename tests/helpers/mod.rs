//! Shared test helpers for integration tests.

#![allow(dead_code)]

use sqlx::SqlitePool;

use canopy_core::config::{CacheConfig, DatabaseConfig};
use canopy_core::{ContentId, LocationId};
use canopy_database::DatabasePool;
use canopy_database::query::QueryExtensions;
use canopy_entity::{ContentStatus, LocatedContent, NewContent};
use canopy_service::{Repo, Subject};

/// Test application context backed by a private in-memory database.
pub struct TestApp {
    /// The repository under test.
    pub repo: Repo,
    /// Pool for direct queries.
    pub db: DatabasePool,
}

impl TestApp {
    /// Create a new test application with no query extensions.
    pub async fn new() -> Self {
        Self::with_extensions(QueryExtensions::new()).await
    }

    /// Create a new test application with `extensions` registered.
    pub async fn with_extensions(extensions: QueryExtensions) -> Self {
        let db = DatabasePool::connect(&DatabaseConfig::in_memory())
            .await
            .expect("Failed to connect to test database");

        canopy_database::migration::run_migrations(db.pool())
            .await
            .expect("Failed to run migrations");

        let repo = Repo::new(db.clone(), extensions, &CacheConfig::default());
        Self { repo, db }
    }

    /// Pool for direct queries.
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    /// Create a root folder.
    pub async fn root_folder(&self, slug: &str) -> LocatedContent {
        self.repo
            .new_root(NewContent::folder(slug.to_uppercase(), slug))
            .await
            .expect("Failed to create root folder")
    }

    /// Create a folder under `parent`.
    pub async fn folder(&self, parent: impl Into<Subject>, slug: &str) -> LocatedContent {
        self.repo
            .new_child(parent, NewContent::folder(slug.to_uppercase(), slug))
            .await
            .expect("Failed to create folder")
    }

    /// Create an article under `parent`.
    pub async fn article(&self, parent: impl Into<Subject>, slug: &str) -> LocatedContent {
        self.repo
            .new_child(
                parent,
                NewContent::article(slug.to_uppercase(), slug)
                    .with_attribute("title", format!("{slug} title")),
            )
            .await
            .expect("Failed to create article")
    }

    /// Insert `n` articles directly below `parent` in a handful of set-based
    /// statements. Slugs run `bulk1..=bulkN`.
    pub async fn seed_children(&self, parent: LocationId, n: i64) {
        let last_content: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM content")
            .fetch_one(self.pool())
            .await
            .expect("Failed to read content ids");
        let last_location: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM location")
            .fetch_one(self.pool())
            .await
            .expect("Failed to read location ids");

        sqlx::query(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < ?1) \
             INSERT INTO content (type, name, slug) \
             SELECT 'article', 'BULK' || i, 'bulk' || i FROM n",
        )
        .bind(n)
        .execute(self.pool())
        .await
        .expect("Failed to seed content");

        sqlx::query("INSERT INTO location (content_id, is_main) SELECT id, 1 FROM content WHERE id > ?1")
            .bind(last_content)
            .execute(self.pool())
            .await
            .expect("Failed to seed locations");

        sqlx::query("INSERT INTO path (ancestor, descendant, length) SELECT id, id, 0 FROM location WHERE id > ?1")
            .bind(last_location)
            .execute(self.pool())
            .await
            .expect("Failed to seed self paths");

        sqlx::query(
            "INSERT INTO path (ancestor, descendant, length) \
             SELECT p.ancestor, l.id, p.length + 1 FROM path p, location l \
             WHERE p.descendant = ?1 AND l.id > ?2",
        )
        .bind(parent)
        .bind(last_location)
        .execute(self.pool())
        .await
        .expect("Failed to seed ancestor paths");
    }

    /// Number of rows in `table`.
    pub async fn count_rows(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(self.pool())
            .await
            .expect("Failed to count rows")
    }

    /// Whether a closure row links `ancestor` to `descendant`.
    pub async fn path_length(&self, ancestor: LocationId, descendant: LocationId) -> Option<i64> {
        sqlx::query_scalar("SELECT length FROM path WHERE ancestor = ?1 AND descendant = ?2")
            .bind(ancestor)
            .bind(descendant)
            .fetch_optional(self.pool())
            .await
            .expect("Failed to read path")
    }

    /// Number of reflexive rows of `location`.
    pub async fn self_paths(&self, location: LocationId) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM path WHERE ancestor = ?1 AND descendant = ?1 AND length = 0",
        )
        .bind(location)
        .fetch_one(self.pool())
        .await
        .expect("Failed to count self paths")
    }

    /// Status straight from the database, bypassing the cache.
    pub async fn status_of(&self, content: ContentId) -> Option<ContentStatus> {
        sqlx::query_scalar("SELECT status FROM content WHERE id = ?1")
            .bind(content)
            .fetch_optional(self.pool())
            .await
            .expect("Failed to read status")
    }

    /// Number of main locations of `content`.
    pub async fn main_count(&self, content: ContentId) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM location WHERE content_id = ?1 AND is_main = 1")
            .bind(content)
            .fetch_one(self.pool())
            .await
            .expect("Failed to count main locations")
    }

    /// Check the closure table against the depth invariant for every
    /// location: one reflexive row, and lengths counting down to it along
    /// the lineage.
    pub async fn assert_closure_consistent(&self) {
        let locations: Vec<LocationId> = sqlx::query_scalar("SELECT id FROM location")
            .fetch_all(self.pool())
            .await
            .expect("Failed to list locations");

        for location in locations {
            assert_eq!(self.self_paths(location).await, 1, "self path of {location}");

            let lineage = self.repo.lineage(location).await.expect("lineage");
            let n = lineage.len() as i64 - 1;
            for (i, ancestor) in lineage.iter().enumerate() {
                assert_eq!(
                    self.path_length(ancestor.id, location).await,
                    Some(n - i as i64),
                    "length from {} to {location}",
                    ancestor.id
                );
            }
        }
    }
}
