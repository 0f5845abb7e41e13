//! # canopy-entity
//!
//! Row models for the content tree: content nodes, their locations, the
//! closure-table paths connecting locations, and trash records.

pub mod content;
pub mod location;
pub mod trash;

pub use content::{Content, ContentKind, ContentStatus, NewContent};
pub use location::{LocatedContent, Location, Path};
pub use trash::{TrashItem, TrashRecord};
