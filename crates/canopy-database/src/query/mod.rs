//! Content query construction.

pub mod builder;
pub mod extension;
pub mod select;

pub use builder::{ContentQuery, OrderColumn, QueryTarget};
pub use extension::{QueryExtensionFn, QueryExtensions};
pub use select::{Bind, Condition, SelectQuery};
