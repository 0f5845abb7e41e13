//! The content repository facade.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use canopy_core::config::CacheConfig;
use canopy_core::result::AppResult;
use canopy_core::{ContentId, LocationId};
use canopy_database::query::{ContentQuery, QueryExtensions, QueryTarget};
use canopy_database::repositories::{
    ContentRepository, DeleteOutcome, LocationRepository, TrashRepository, TreeRepository,
};
use canopy_database::DatabasePool;
use canopy_entity::content::{Content, NewContent};
use canopy_entity::location::{LocatedContent, Location, Path};

use super::operation::MoveOperation;
use crate::cache::ContentCache;
use crate::state::TreeState;
use crate::subject::Subject;
use crate::trash::TrashService;

/// Entry point for reading and changing the content tree.
///
/// Cloning is cheap; clones share the write lock, the revision counter and
/// the cache.
#[derive(Debug, Clone)]
pub struct Repo {
    /// Connection pool.
    db: DatabasePool,
    /// Content rows.
    contents: Arc<ContentRepository>,
    /// Locations and closure reads.
    locations: Arc<LocationRepository>,
    /// Moves and deletes.
    tree: Arc<TreeRepository>,
    /// Trash transitions.
    trash: Arc<TrashRepository>,
    /// Registered query extensions.
    extensions: Arc<QueryExtensions>,
    /// Write lock and revision.
    state: Arc<TreeState>,
    /// Content row cache.
    cache: ContentCache,
}

impl Repo {
    /// Creates a repository over `db` with a fixed set of query extensions.
    pub fn new(db: DatabasePool, extensions: QueryExtensions, cache: &CacheConfig) -> Self {
        let pool = db.pool().clone();
        Self {
            contents: Arc::new(ContentRepository::new(pool.clone())),
            locations: Arc::new(LocationRepository::new(pool.clone())),
            tree: Arc::new(TreeRepository::new(pool.clone())),
            trash: Arc::new(TrashRepository::new(pool)),
            extensions: Arc::new(extensions),
            state: Arc::new(TreeState::new()),
            cache: ContentCache::new(cache),
            db,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.db.health_check().await
    }

    /// The current tree revision.
    pub fn revision(&self) -> u64 {
        self.state.revision()
    }

    /// Fails with `ConcurrentModification` if a bulk mutation happened
    /// since `seen` was read.
    pub fn ensure_current(&self, seen: u64) -> AppResult<()> {
        self.state.ensure_current(seen)
    }

    // -- Construction --

    /// Create a root node.
    pub async fn new_root(&self, data: NewContent) -> AppResult<LocatedContent> {
        let _guard = self.state.write().await;
        let (content, location) = self.contents.create_root(&data).await?;
        self.cache.put(content.clone()).await;
        Ok(LocatedContent::new(location, content))
    }

    /// Create a node under `parent`.
    pub async fn new_child(
        &self,
        parent: impl Into<Subject>,
        data: NewContent,
    ) -> AppResult<LocatedContent> {
        let _guard = self.state.write().await;
        let parent = self.resolve(parent.into()).await?;
        let (content, location) = self.contents.create_child(parent, &data).await?;
        self.cache.put(content.clone()).await;
        Ok(LocatedContent::new(location, content))
    }

    /// Place an existing node at another location, under `parent` or as a
    /// new root.
    pub async fn add_location(
        &self,
        content: ContentId,
        parent: Option<Subject>,
        make_main: bool,
    ) -> AppResult<Location> {
        let _guard = self.state.write().await;
        let parent = match parent {
            Some(subject) => Some(self.resolve(subject).await?),
            None => None,
        };
        let location = self.locations.add_location(content, parent, make_main).await?;
        if make_main {
            self.state.bump();
        }
        Ok(location)
    }

    /// Make `location` the main location of `content`.
    pub async fn set_main_location(&self, content: ContentId, location: LocationId) -> AppResult<()> {
        let _guard = self.state.write().await;
        self.contents.set_main_location(content, location).await?;
        self.state.bump();
        Ok(())
    }

    // -- Reads --

    /// A node by id.
    pub async fn content(&self, id: ContentId) -> AppResult<Content> {
        if let Some(content) = self.cache.get(id).await {
            return Ok(content);
        }
        let seen = self.cache.epoch();
        let content = self.contents.get(id).await?;
        self.cache.fill(seen, content.clone()).await;
        Ok(content)
    }

    /// A node by id, if it exists.
    pub async fn find_content(&self, id: ContentId) -> AppResult<Option<Content>> {
        if let Some(content) = self.cache.get(id).await {
            return Ok(Some(content));
        }
        let seen = self.cache.epoch();
        let content = self.contents.find_by_id(id).await?;
        if let Some(content) = &content {
            self.cache.fill(seen, content.clone()).await;
        }
        Ok(content)
    }

    /// Update the display fields of a node.
    pub async fn update_content(&self, id: ContentId, name: &str, slug: &str) -> AppResult<Content> {
        let _guard = self.state.write().await;
        let content = self.contents.update(id, name, slug).await?;
        // Readers that loaded the old row must not store it afterwards.
        self.cache.invalidate(id).await;
        self.cache.put(content.clone()).await;
        info!(content_id = %id, "Content updated");
        Ok(content)
    }

    /// Nodes created by `creator`.
    pub async fn own_content(&self, creator: ContentId) -> AppResult<Vec<Content>> {
        self.contents.own_content(creator).await
    }

    /// A location by id.
    pub async fn location(&self, id: LocationId) -> AppResult<Location> {
        self.locations.get(id).await
    }

    /// The main location of a node.
    pub async fn main_location(&self, content: ContentId) -> AppResult<Location> {
        self.contents.main_location(content).await
    }

    /// Every location of a node.
    pub async fn locations(&self, content: ContentId) -> AppResult<Vec<Location>> {
        self.locations.find_by_content(content).await
    }

    /// The parent location, or `None` for a root.
    pub async fn parent(&self, subject: impl Into<Subject>) -> AppResult<Option<Location>> {
        let location = self.resolve(subject.into()).await?;
        self.locations.parent(location).await
    }

    /// Locations from the root down to the subject.
    pub async fn lineage(&self, subject: impl Into<Subject>) -> AppResult<Vec<Location>> {
        let location = self.resolve(subject.into()).await?;
        self.locations.lineage(location).await
    }

    /// Slugs along the lineage, root first.
    pub async fn slugs(&self, subject: impl Into<Subject>) -> AppResult<Vec<String>> {
        let location = self.resolve(subject.into()).await?;
        self.locations.slugs(location).await
    }

    /// Closure rows ending at the subject, root first.
    pub async fn paths(&self, subject: impl Into<Subject>) -> AppResult<Vec<Path>> {
        let location = self.resolve(subject.into()).await?;
        self.locations.paths(location).await
    }

    /// Every location below the subject, nearest first.
    pub async fn descendants(&self, subject: impl Into<Subject>) -> AppResult<Vec<Location>> {
        let location = self.resolve(subject.into()).await?;
        self.locations.descendants(location).await
    }

    /// Start a lazily compiled query.
    pub fn query(&self, target: impl Into<QueryTarget>) -> ContentQuery {
        ContentQuery::new(self.db.pool().clone(), Arc::clone(&self.extensions), target)
    }

    // -- Structural changes --

    /// Prepare a move of `subject`. Nothing happens until
    /// [`MoveOperation::to`] runs.
    pub fn move_subject(&self, subject: impl Into<Subject>) -> MoveOperation<'_> {
        MoveOperation::new(self, subject.into())
    }

    /// Delete a node with every location, or one location subtree.
    ///
    /// Nodes left without any location are removed as well.
    pub async fn delete(&self, subject: impl Into<Subject>) -> AppResult<DeleteOutcome> {
        let _guard = self.state.write().await;
        let outcome = match subject.into() {
            Subject::Content(id) => self.tree.delete_content(id).await?,
            Subject::Location(id) => self.tree.delete_location(id).await?,
        };
        self.after_bulk_write();
        Ok(outcome)
    }

    /// The trash.
    pub fn trash(&self) -> TrashService {
        TrashService::new(
            Arc::clone(&self.trash),
            Arc::clone(&self.state),
            self.cache.clone(),
        )
    }

    // -- Internals shared with operations --

    pub(crate) fn tree(&self) -> &TreeRepository {
        &self.tree
    }

    pub(crate) fn state(&self) -> &TreeState {
        &self.state
    }

    /// Location an operation acts on: the location itself, or a node's main
    /// location.
    pub(crate) async fn resolve(&self, subject: Subject) -> AppResult<LocationId> {
        match subject {
            Subject::Location(id) => Ok(id),
            Subject::Content(id) => Ok(self.contents.main_location(id).await?.id),
        }
    }

    pub(crate) fn after_bulk_write(&self) {
        self.state.bump();
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_core::config::DatabaseConfig;

    async fn repo() -> Repo {
        let db = DatabasePool::connect(&DatabaseConfig::in_memory()).await.unwrap();
        canopy_database::migration::run_migrations(db.pool()).await.unwrap();
        Repo::new(db, QueryExtensions::new(), &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_row_read_before_trash_is_not_cached() {
        let repo = repo().await;
        let folder = repo.new_root(NewContent::folder("Docs", "docs")).await.unwrap();
        let id = folder.content.id;
        repo.cache.invalidate(id).await;

        // A reader loads the row, then a trash insert commits before the
        // reader stores it.
        let seen = repo.cache.epoch();
        let stale = repo.contents.get(id).await.unwrap();
        repo.trash().insert(id).await.unwrap();
        repo.cache.fill(seen, stale).await;

        assert!(repo.content(id).await.unwrap().is_trashed());
    }

    #[tokio::test]
    async fn test_row_read_before_update_is_not_cached() {
        let repo = repo().await;
        let folder = repo.new_root(NewContent::folder("Docs", "docs")).await.unwrap();
        let id = folder.content.id;
        repo.cache.invalidate(id).await;

        let seen = repo.cache.epoch();
        let stale = repo.contents.get(id).await.unwrap();
        repo.update_content(id, "Guides", "guides").await.unwrap();
        repo.cache.fill(seen, stale).await;

        assert_eq!(repo.content(id).await.unwrap().slug, "guides");
    }
}
