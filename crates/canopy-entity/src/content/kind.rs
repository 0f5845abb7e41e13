//! Content kind discriminant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The polymorphic kind of a content node, stored in the `type` column.
///
/// Kind-specific data lives in the node's `attributes` document rather than
/// in per-kind tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Plain content with no specialised behaviour.
    Content,
    /// A container for other content.
    Folder,
    /// An article.
    Article,
}

impl ContentKind {
    /// All known kinds.
    pub const ALL: [ContentKind; 3] = [Self::Content, Self::Folder, Self::Article];

    /// Return the kind as the lowercase string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Folder => "folder",
            Self::Article => "article",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = canopy_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "folder" => Ok(Self::Folder),
            "article" => Ok(Self::Article),
            _ => Err(canopy_core::AppError::validation(format!(
                "Invalid content kind: '{s}'. Expected one of: content, folder, article"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Folder".parse::<ContentKind>().unwrap(), ContentKind::Folder);
        assert!("page".parse::<ContentKind>().is_err());
    }

    #[test]
    fn test_as_str_matches_serde() {
        for kind in ContentKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
