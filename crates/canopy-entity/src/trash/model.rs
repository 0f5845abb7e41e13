//! Trash entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::ContentId;

use crate::content::Content;

/// Marks a trashed node as restorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TrashRecord {
    /// The trashed node.
    pub content_id: ContentId,
    /// When the node was moved to the trash.
    pub created_at: DateTime<Utc>,
}

/// A trash entry prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashItem {
    /// The trash record.
    pub record: TrashRecord,
    /// The trashed node.
    pub content: Content,
    /// Slugs along the main location's lineage, root first.
    pub slugs: Vec<String>,
}
