//! Content entity model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;

use canopy_core::ContentId;

use super::kind::ContentKind;
use super::status::ContentStatus;

/// A content node. Its placements in the tree are [`Location`]s.
///
/// [`Location`]: crate::location::Location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Content {
    /// Unique content identifier.
    pub id: ContentId,
    /// Polymorphic kind discriminant.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Visibility status.
    pub status: ContentStatus,
    /// The node that created this one. Not part of the tree structure.
    pub creator_id: Option<ContentId>,
    /// Kind-specific fields.
    pub attributes: Json<Value>,
}

impl Content {
    /// Whether default queries can see this node.
    pub fn is_available(&self) -> bool {
        self.status == ContentStatus::Available
    }

    /// Whether this node sits in the trash and can be restored.
    pub fn is_trashed(&self) -> bool {
        self.status == ContentStatus::Trashed
    }

    /// Whether this node is waiting to be physically removed.
    pub fn is_pending_deletion(&self) -> bool {
        self.status == ContentStatus::PendingDeletion
    }

    /// Look up a kind-specific attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.0.get(key)
    }
}

/// Data required to create a new content node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContent {
    /// Kind of the new node.
    pub kind: ContentKind,
    /// Display name.
    pub name: String,
    /// URL slug.
    pub slug: String,
    /// Optional creator back-reference.
    pub creator_id: Option<ContentId>,
    /// Kind-specific fields; must be a JSON object.
    pub attributes: Value,
}

impl NewContent {
    /// Start describing a node of `kind`.
    pub fn new(kind: ContentKind, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            slug: slug.into(),
            creator_id: None,
            attributes: Value::Object(Default::default()),
        }
    }

    /// Shorthand for a folder.
    pub fn folder(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::new(ContentKind::Folder, name, slug)
    }

    /// Shorthand for an article.
    pub fn article(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::new(ContentKind::Article, name, slug)
    }

    /// Set the creator.
    pub fn created_by(mut self, creator: ContentId) -> Self {
        self.creator_id = Some(creator);
        self
    }

    /// Set a kind-specific attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(map) = &mut self.attributes {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Check the fields before they reach the database.
    pub fn validate(&self) -> canopy_core::AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(canopy_core::AppError::validation(
                "Content name cannot be empty",
            ));
        }
        if self.slug.trim().is_empty() {
            return Err(canopy_core::AppError::validation(
                "Content slug cannot be empty",
            ));
        }
        if !self.attributes.is_object() {
            return Err(canopy_core::AppError::validation(
                "Content attributes must be a JSON object",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_attributes() {
        let new = NewContent::article("A1", "a1").with_attribute("title", "a1 title");
        assert_eq!(new.attributes["title"], "a1 title");
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_slug() {
        let new = NewContent::folder("Root", "  ");
        assert!(new.validate().is_err());
    }
}
