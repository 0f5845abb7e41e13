//! Shared value types.

pub mod id;
pub mod sorting;

pub use id::{ContentId, LocationId};
pub use sorting::SortDirection;
