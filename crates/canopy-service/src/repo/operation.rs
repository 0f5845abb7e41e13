//! Deferred move handle.

use canopy_core::result::AppResult;
use canopy_database::repositories::MoveOutcome;

use super::service::Repo;
use crate::subject::Subject;

/// A move waiting for its destination.
#[derive(Debug)]
#[must_use = "a move does nothing until `to` is called"]
pub struct MoveOperation<'a> {
    repo: &'a Repo,
    subject: Subject,
}

impl<'a> MoveOperation<'a> {
    pub(crate) fn new(repo: &'a Repo, subject: Subject) -> Self {
        Self { repo, subject }
    }

    /// Move the subject's subtree under `new_parent`.
    ///
    /// A node subject moves through its main location; its other locations
    /// stay where they are. Moving under itself or a descendant fails with
    /// `IntegrityViolation` and changes nothing.
    pub async fn to(self, new_parent: impl Into<Subject>) -> AppResult<MoveOutcome> {
        let _guard = self.repo.state().write().await;
        let subject = self.repo.resolve(self.subject).await?;
        let new_parent = self.repo.resolve(new_parent.into()).await?;

        let outcome = self.repo.tree().move_subtree(subject, new_parent).await?;
        self.repo.after_bulk_write();
        Ok(outcome)
    }
}
