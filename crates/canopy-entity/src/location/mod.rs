//! Location and closure-table entities.

pub mod located;
pub mod model;
pub mod path;

pub use located::LocatedContent;
pub use model::Location;
pub use path::Path;
