//! Content visibility status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a content node.
///
/// `Available -> Trashed -> PendingDeletion -> (physically deleted)`, with
/// `Trashed -> Available` as the restore path.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Visible to default queries.
    #[default]
    Available = 0,
    /// Soft-deleted and restorable while a trash record exists.
    Trashed = 10,
    /// Irreversibly removed from the trash; awaiting the reaper.
    PendingDeletion = 11,
}

impl ContentStatus {
    /// The integer stored in the `status` column.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Return the status as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Trashed => "trashed",
            Self::PendingDeletion => "pending_deletion",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ContentStatus::Available.code(), 0);
        assert_eq!(ContentStatus::Trashed.code(), 10);
        assert_eq!(ContentStatus::PendingDeletion.code(), 11);
    }
}
