//! Closure-table rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use canopy_core::LocationId;

/// One `(ancestor, descendant, length)` triple of the closure table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Path {
    /// Ancestor location.
    pub ancestor: LocationId,
    /// Descendant location.
    pub descendant: LocationId,
    /// Number of edges between the two; zero for the reflexive row.
    pub length: i64,
}

impl Path {
    /// Check if this is the reflexive row of a location.
    pub fn is_self_reference(&self) -> bool {
        self.ancestor == self.descendant && self.length == 0
    }

    /// Check if this is a direct parent-child edge.
    pub fn is_direct(&self) -> bool {
        self.length == 1
    }
}

/// Sort paths of a single descendant root-first (length descending).
pub fn sort_root_first(paths: &mut [Path]) {
    paths.sort_by(|a, b| b.length.cmp(&a.length));
}

/// The ancestors of a location, root first and ending with the location.
///
/// Expects every path to share the same descendant.
pub fn lineage(paths: &[Path]) -> Vec<LocationId> {
    let mut sorted = paths.to_vec();
    sort_root_first(&mut sorted);
    sorted.into_iter().map(|p| p.ancestor).collect()
}

/// The direct parent of a location, if its paths contain one.
pub fn parent(paths: &[Path]) -> Option<LocationId> {
    paths.iter().find(|p| p.is_direct()).map(|p| p.ancestor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(ancestor: i64, descendant: i64, length: i64) -> Path {
        Path {
            ancestor: LocationId(ancestor),
            descendant: LocationId(descendant),
            length,
        }
    }

    #[test]
    fn test_lineage_orders_root_first() {
        let paths = vec![path(3, 3, 0), path(1, 3, 2), path(2, 3, 1)];
        assert_eq!(
            lineage(&paths),
            vec![LocationId(1), LocationId(2), LocationId(3)]
        );
    }

    #[test]
    fn test_parent_of_root_is_none() {
        assert_eq!(parent(&[path(1, 1, 0)]), None);
        assert_eq!(parent(&[path(1, 2, 1), path(2, 2, 0)]), Some(LocationId(1)));
    }
}
