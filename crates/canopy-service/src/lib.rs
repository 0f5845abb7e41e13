//! # canopy-service
//!
//! The repository facade a web layer talks to. [`Repo`] builds nodes,
//! moves and deletes subtrees, hands out lazily compiled queries and the
//! [`TrashService`].
//!
//! Structural writes are serialized by one async lock shared by every clone
//! of a `Repo`. Each bulk write advances a revision counter and clears the
//! content cache, since rows read before it may no longer match the
//! database.

pub mod cache;
pub mod repo;
pub mod state;
pub mod subject;
pub mod trash;

pub use cache::ContentCache;
pub use repo::{MoveOperation, Repo};
pub use state::TreeState;
pub use subject::Subject;
pub use trash::TrashService;
