//! Repository implementations for the content tree.

pub mod content;
pub mod location;
pub mod trash;
pub mod tree;

pub use content::ContentRepository;
pub use location::LocationRepository;
pub use trash::TrashRepository;
pub use tree::{DeleteOutcome, MoveOutcome, TreeRepository};
