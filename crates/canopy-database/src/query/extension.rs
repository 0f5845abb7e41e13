//! Named query extensions.
//!
//! An extension is a function over the compiled [`SelectQuery`]. The
//! registry is built once at startup and handed to every query by the
//! service layer; there is no global instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use canopy_core::error::AppError;
use canopy_core::result::AppResult;

use super::select::SelectQuery;

/// Signature of a query extension. Receives the query compiled so far and
/// the arguments given at the call site.
pub type QueryExtensionFn =
    Arc<dyn Fn(SelectQuery, &[Value]) -> AppResult<SelectQuery> + Send + Sync>;

/// Operation names owned by the builder itself.
pub const RESERVED_NAMES: &[&str] = &["children", "depth", "status", "load_path", "load_locations"];

/// Registry of query extensions keyed by name.
#[derive(Clone, Default)]
pub struct QueryExtensions {
    methods: HashMap<String, QueryExtensionFn>,
}

impl QueryExtensions {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`.
    ///
    /// Each name can be registered once; builtin operation names are
    /// rejected as well.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> AppResult<()>
    where
        F: Fn(SelectQuery, &[Value]) -> AppResult<SelectQuery> + Send + Sync + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AppError::validation("Extension name cannot be empty"));
        }
        if RESERVED_NAMES.contains(&name.as_str()) {
            return Err(AppError::conflict(format!(
                "Query extension name '{name}' is reserved"
            )));
        }
        if self.methods.contains_key(&name) {
            return Err(AppError::conflict(format!(
                "Query extension '{name}' is already registered"
            )));
        }

        info!(extension = %name, "Query extension registered");
        self.methods.insert(name, Arc::new(f));
        Ok(())
    }

    /// Looks up an extension.
    pub fn get(&self, name: &str) -> Option<&QueryExtensionFn> {
        self.methods.get(name)
    }

    /// Returns whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns whether no extension is registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for QueryExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExtensions")
            .field("methods", &self.names())
            .finish()
    }
}
