//! Physical removal of content pending deletion.

use std::sync::Arc;

use async_trait::async_trait;

use canopy_core::result::AppResult;
use canopy_database::repositories::DeleteOutcome;
use canopy_service::TrashService;

/// Something that can physically delete content pending deletion.
#[async_trait]
pub trait TrashPurger: Send + Sync + std::fmt::Debug {
    /// Remove everything pending deletion.
    async fn purge(&self) -> AppResult<DeleteOutcome>;
}

#[async_trait]
impl TrashPurger for TrashService {
    async fn purge(&self) -> AppResult<DeleteOutcome> {
        self.permanently_empty().await
    }
}

/// Job that empties the pending-deletion backlog.
#[derive(Debug, Clone)]
pub struct TrashReaper {
    purger: Arc<dyn TrashPurger>,
}

impl TrashReaper {
    /// Create a reaper over `purger`.
    pub fn new(purger: Arc<dyn TrashPurger>) -> Self {
        Self { purger }
    }

    /// Run one pass.
    pub async fn run_once(&self) -> AppResult<DeleteOutcome> {
        tracing::info!("Running trash reaper");

        let outcome = self.purger.purge().await?;

        tracing::info!(
            locations_removed = outcome.locations_removed,
            contents_removed = outcome.contents_removed,
            "Trash reaper finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingPurger {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TrashPurger for CountingPurger {
        async fn purge(&self) -> AppResult<DeleteOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(DeleteOutcome {
                locations_removed: 3,
                contents_removed: 2,
            })
        }
    }

    #[tokio::test]
    async fn test_run_once_delegates_to_purger() {
        let purger = Arc::new(CountingPurger::default());
        let reaper = TrashReaper::new(purger.clone());

        let outcome = reaper.run_once().await.unwrap();
        assert_eq!(outcome.contents_removed, 2);
        assert_eq!(purger.calls.load(Ordering::SeqCst), 1);
    }
}
