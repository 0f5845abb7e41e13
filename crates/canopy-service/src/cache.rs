//! In-memory cache of content rows using moka.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use canopy_core::config::CacheConfig;
use canopy_core::ContentId;
use canopy_entity::content::Content;

/// Content rows keyed by id.
///
/// Only single-row writes update entries in place. Anything that changes
/// many rows at once clears the whole cache.
///
/// Every invalidation advances an epoch. Readers capture the epoch before
/// going to the database and store the row with [`fill`](Self::fill), which
/// refuses rows read before an invalidation.
#[derive(Debug, Clone)]
pub struct ContentCache {
    cache: Cache<ContentId, Content>,
    epoch: Arc<AtomicU64>,
}

impl ContentCache {
    /// Create a cache from configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .build();
        Self {
            cache,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The current invalidation epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// A cached row.
    pub async fn get(&self, id: ContentId) -> Option<Content> {
        self.cache.get(&id).await
    }

    /// Store a row written by the caller.
    pub async fn put(&self, content: Content) {
        self.cache.insert(content.id, content).await;
    }

    /// Store a row read from the database while the epoch was `seen`.
    ///
    /// Skipped when an invalidation happened since. An invalidation racing
    /// the insert removes the entry again.
    pub async fn fill(&self, seen: u64, content: Content) {
        if self.epoch() != seen {
            return;
        }
        let id = content.id;
        self.cache.insert(id, content).await;
        if self.epoch() != seen {
            self.cache.invalidate(&id).await;
            debug!(content_id = %id, "Dropped row read before invalidation");
        }
    }

    /// Drop one row.
    pub async fn invalidate(&self, id: ContentId) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate(&id).await;
    }

    /// Drop every row.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.cache.invalidate_all();
        debug!("Content cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_entity::content::{ContentKind, ContentStatus};
    use sqlx::types::Json;

    fn content(id: i64) -> Content {
        Content {
            id: ContentId(id),
            kind: ContentKind::Folder,
            name: format!("folder {id}"),
            slug: format!("folder-{id}"),
            status: ContentStatus::Available,
            creator_id: None,
            attributes: Json(serde_json::json!({})),
        }
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = ContentCache::new(&CacheConfig::default());
        cache.put(content(1)).await;
        cache.put(content(2)).await;

        assert_eq!(cache.get(ContentId(1)).await.map(|c| c.slug), Some("folder-1".into()));

        cache.invalidate(ContentId(1)).await;
        assert!(cache.get(ContentId(1)).await.is_none());

        cache.invalidate_all();
        assert!(cache.get(ContentId(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_fill_skips_rows_read_before_invalidation() {
        let cache = ContentCache::new(&CacheConfig::default());

        let seen = cache.epoch();
        cache.fill(seen, content(1)).await;
        assert!(cache.get(ContentId(1)).await.is_some());

        let seen = cache.epoch();
        cache.invalidate_all();
        cache.fill(seen, content(2)).await;
        assert!(cache.get(ContentId(2)).await.is_none());

        let seen = cache.epoch();
        cache.invalidate(ContentId(3)).await;
        cache.fill(seen, content(3)).await;
        assert!(cache.get(ContentId(3)).await.is_none());
    }
}
