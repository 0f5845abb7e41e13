//! # canopy-database
//!
//! SQLite connection management, the closure-table repositories that keep
//! the content tree consistent, and the lazily compiled content query.

pub mod connection;
pub mod migration;
pub mod query;
pub mod repositories;

pub use connection::DatabasePool;
pub use query::{ContentQuery, QueryExtensions, QueryTarget, SelectQuery};
