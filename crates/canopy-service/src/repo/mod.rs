//! Content repository and its deferred operations.

pub mod operation;
pub mod service;

pub use operation::MoveOperation;
pub use service::Repo;
