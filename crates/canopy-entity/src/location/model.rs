//! Location entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::{ContentId, LocationId};

/// A placement of a content node in the tree.
///
/// A node may have several locations; exactly one of them is main.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Location {
    /// Unique location identifier.
    pub id: LocationId,
    /// The owning content node.
    pub content_id: ContentId,
    /// Whether this is the node's canonical placement.
    pub is_main: bool,
}
