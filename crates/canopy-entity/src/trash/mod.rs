//! Trash entities.

pub mod model;

pub use model::{TrashItem, TrashRecord};
