//! Content node entities.

pub mod kind;
pub mod model;
pub mod status;

pub use kind::ContentKind;
pub use model::{Content, NewContent};
pub use status::ContentStatus;
