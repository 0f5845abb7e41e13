//! What a structural operation acts on.

use serde::{Deserialize, Serialize};

use canopy_core::{ContentId, LocationId};

/// A node or one of its placements.
///
/// Operations given a node act on its main location, except delete, which
/// removes every location of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Subject {
    /// A content node.
    Content(ContentId),
    /// A single location.
    Location(LocationId),
}

impl From<ContentId> for Subject {
    fn from(id: ContentId) -> Self {
        Self::Content(id)
    }
}

impl From<LocationId> for Subject {
    fn from(id: LocationId) -> Self {
        Self::Location(id)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(id) => write!(f, "content {id}"),
            Self::Location(id) => write!(f, "location {id}"),
        }
    }
}
