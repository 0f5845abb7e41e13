//! A location joined with its content, as returned by content queries.

use serde::{Deserialize, Serialize};

use canopy_core::LocationId;

use super::model::Location;
use super::path::{self, Path};
use crate::content::Content;

/// A content node seen through one of its locations.
///
/// `paths` and `locations` are only populated when the query asked for them
/// with `load_path()` / `load_locations()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedContent {
    /// The placement this row was reached through.
    pub location: Location,
    /// The node at that placement.
    pub content: Content,
    /// Every closure row whose descendant is `location`, root first.
    pub paths: Option<Vec<Path>>,
    /// Every location of `content`.
    pub locations: Option<Vec<Location>>,
}

impl LocatedContent {
    /// Build a row with nothing eager-loaded.
    pub fn new(location: Location, content: Content) -> Self {
        Self {
            location,
            content,
            paths: None,
            locations: None,
        }
    }

    /// Parent location, derived from eager-loaded paths.
    pub fn parent(&self) -> Option<LocationId> {
        self.paths.as_deref().and_then(path::parent)
    }

    /// Lineage root-first, derived from eager-loaded paths.
    pub fn lineage(&self) -> Option<Vec<LocationId>> {
        self.paths.as_deref().map(path::lineage)
    }

    /// The main location among eager-loaded locations.
    pub fn main_location(&self) -> Option<&Location> {
        self.locations
            .as_ref()
            .and_then(|locations| locations.iter().find(|l| l.is_main))
    }
}
