//! Trash service.

pub mod service;

pub use service::TrashService;
