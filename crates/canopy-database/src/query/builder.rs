//! Lazily compiled content query.
//!
//! [`ContentQuery`] only records operations. Nothing touches the database
//! until a terminal (`all`, `one`, `first`, `count`, `get`, `contents`) runs,
//! at which point the operations compile into a [`SelectQuery`] in this
//! order:
//!
//! 1. The base shape: `children()` if requested, otherwise the target.
//! 2. Default policies, unless the terminal is `get`: `depth(1)` when
//!    `children()` was used without an explicit depth, and
//!    `status(Available)` when no status was requested.
//! 3. Recorded operations and extensions, in call order.
//! 4. Name/slug filters, ordering and paging.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use canopy_core::error::{AppError, ErrorKind};
use canopy_core::result::AppResult;
use canopy_core::{ContentId, LocationId, SortDirection};
use canopy_entity::content::{Content, ContentKind, ContentStatus};
use canopy_entity::location::{LocatedContent, Location, Path};

use super::extension::QueryExtensions;
use super::select::{Bind, Condition, SelectQuery};

/// What a query is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryTarget {
    /// Nodes of the listed kinds at their main location. Empty means every
    /// kind.
    Kinds(Vec<ContentKind>),
    /// One node at its main location. `children()` reads below it.
    Content(ContentId),
    /// One location. `children()` reads below it.
    Location(LocationId),
}

impl QueryTarget {
    /// Every node regardless of kind.
    pub fn all() -> Self {
        Self::Kinds(Vec::new())
    }
}

impl From<ContentKind> for QueryTarget {
    fn from(kind: ContentKind) -> Self {
        Self::Kinds(vec![kind])
    }
}

impl From<Vec<ContentKind>> for QueryTarget {
    fn from(kinds: Vec<ContentKind>) -> Self {
        Self::Kinds(kinds)
    }
}

impl From<&[ContentKind]> for QueryTarget {
    fn from(kinds: &[ContentKind]) -> Self {
        Self::Kinds(kinds.to_vec())
    }
}

impl From<ContentId> for QueryTarget {
    fn from(id: ContentId) -> Self {
        Self::Content(id)
    }
}

impl From<LocationId> for QueryTarget {
    fn from(id: LocationId) -> Self {
        Self::Location(id)
    }
}

/// Sortable columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderColumn {
    /// Content id.
    Id,
    /// Display name.
    Name,
    /// Slug.
    Slug,
    /// Kind discriminant.
    Kind,
    /// Distance from the `children()` anchor.
    Depth,
}

impl OrderColumn {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "c.id",
            Self::Name => "c.name",
            Self::Slug => "c.slug",
            Self::Kind => "c.type",
            Self::Depth => "p.length",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum QueryOp {
    Depth(u32),
    Status(ContentStatus),
    AnyStatus,
    LoadPath,
    LoadLocations,
    Extension { name: String, args: Vec<Value> },
}

impl QueryOp {
    fn key(&self) -> &str {
        match self {
            Self::Depth(_) => "depth",
            Self::Status(_) | Self::AnyStatus => "status",
            Self::LoadPath => "load_path",
            Self::LoadLocations => "load_locations",
            Self::Extension { name, .. } => name,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocatedRow {
    location_id: LocationId,
    is_main: bool,
    #[sqlx(flatten)]
    content: Content,
}

impl From<LocatedRow> for LocatedContent {
    fn from(row: LocatedRow) -> Self {
        let location = Location {
            id: row.location_id,
            content_id: row.content.id,
            is_main: row.is_main,
        };
        LocatedContent::new(location, row.content)
    }
}

/// A content query under construction.
#[derive(Debug, Clone)]
pub struct ContentQuery {
    pool: SqlitePool,
    extensions: Arc<QueryExtensions>,
    target: QueryTarget,
    children: Option<Vec<ContentKind>>,
    ops: Vec<QueryOp>,
    name: Option<String>,
    slug: Option<String>,
    order: Vec<(OrderColumn, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl ContentQuery {
    /// Start a query about `target`.
    pub fn new(
        pool: SqlitePool,
        extensions: Arc<QueryExtensions>,
        target: impl Into<QueryTarget>,
    ) -> Self {
        Self {
            pool,
            extensions,
            target: target.into(),
            children: None,
            ops: Vec::new(),
            name: None,
            slug: None,
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Read the descendants of the target instead of the target itself,
    /// keeping only the listed kinds (any of them). No kinds means every
    /// kind. Replaces an earlier `children()`.
    pub fn children(mut self, kinds: impl IntoIterator<Item = ContentKind>) -> Self {
        self.children = Some(kinds.into_iter().collect());
        self
    }

    /// Keep descendants between 1 and `levels` edges below the anchor.
    pub fn depth(self, levels: u32) -> Self {
        self.record(QueryOp::Depth(levels))
    }

    /// Keep nodes with `status`.
    pub fn status(self, status: ContentStatus) -> Self {
        self.record(QueryOp::Status(status))
    }

    /// Keep nodes of every status, trashed and pending ones included.
    pub fn any_status(self) -> Self {
        self.record(QueryOp::AnyStatus)
    }

    /// Eager-load the closure rows of each result location.
    pub fn load_path(self) -> Self {
        self.record(QueryOp::LoadPath)
    }

    /// Eager-load every location of each result node.
    pub fn load_locations(self) -> Self {
        self.record(QueryOp::LoadLocations)
    }

    /// Schedule the registered extension `name` with `args`.
    pub fn extension(self, name: impl Into<String>, args: Vec<Value>) -> Self {
        self.record(QueryOp::Extension {
            name: name.into(),
            args,
        })
    }

    /// Keep nodes named exactly `name`.
    pub fn filter_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Keep nodes whose slug is exactly `slug`.
    pub fn filter_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    /// Append an ordering term.
    pub fn order_by(mut self, column: OrderColumn, direction: SortDirection) -> Self {
        self.order.push((column, direction));
        self
    }

    /// Return at most `limit` rows.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` rows.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compile with default policies, without executing.
    pub fn compiled(&self) -> AppResult<SelectQuery> {
        self.compile(true)
    }

    /// Every matching row.
    pub async fn all(&self) -> AppResult<Vec<LocatedContent>> {
        let query = self.compile(true)?;
        self.fetch(&query).await
    }

    /// Exactly one matching row.
    pub async fn one(&self) -> AppResult<LocatedContent> {
        let mut rows = self.all().await?;
        match rows.len() {
            0 => Err(AppError::not_found("Query returned no content")),
            1 => Ok(rows.remove(0)),
            n => Err(AppError::conflict(format!(
                "Query returned {n} rows where one was expected"
            ))),
        }
    }

    /// The first matching row, if any.
    pub async fn first(&self) -> AppResult<Option<LocatedContent>> {
        let query = self.compile(true)?.limit(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    /// Number of matching rows.
    pub async fn count(&self) -> AppResult<i64> {
        let query = self.compile(true)?;
        let mut qb = query.to_count_builder();
        debug!(sql = %qb.sql(), "Counting content query");

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count content", e))?;
        Ok(count)
    }

    /// Look a node up by id within the query shape.
    ///
    /// Default policies are not applied: trashed and pending nodes are
    /// returned, and `children()` without `depth()` includes the anchor.
    /// Explicit operations still apply.
    pub async fn get(&self, id: ContentId) -> AppResult<LocatedContent> {
        let query = self
            .compile(false)?
            .filter(Condition::new("c.id = ?", vec![Bind::Int(id.get())])?)
            .limit(1);

        self.fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found(format!("Content {id} not found")))
    }

    /// Matching nodes without their locations, each node once.
    pub async fn contents(&self) -> AppResult<Vec<Content>> {
        let mut seen = std::collections::HashSet::new();
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|row| seen.insert(row.content.id))
            .map(|row| row.content)
            .collect())
    }

    fn record(mut self, op: QueryOp) -> Self {
        match self.ops.iter_mut().find(|existing| existing.key() == op.key()) {
            Some(existing) => *existing = op,
            None => self.ops.push(op),
        }
        self
    }

    fn has_op(&self, key: &str) -> bool {
        self.ops.iter().any(|op| op.key() == key)
    }

    fn compile(&self, apply_defaults: bool) -> AppResult<SelectQuery> {
        let mut query = self.base()?;

        let mut defaults = Vec::new();
        if apply_defaults {
            if self.children.is_some() && !self.has_op("depth") {
                defaults.push(QueryOp::Depth(1));
            }
            if !self.has_op("status") {
                defaults.push(QueryOp::Status(ContentStatus::Available));
            }
        }

        for op in self.ops.iter().chain(defaults.iter()) {
            query = self.apply(query, op)?;
        }

        self.apply_tail(query)
    }

    fn base(&self) -> AppResult<SelectQuery> {
        let query = match (&self.children, &self.target) {
            (Some(_), QueryTarget::Kinds(_)) => {
                return Err(AppError::validation(
                    "children() needs a content or location target",
                ));
            }
            (Some(_), QueryTarget::Location(id)) => SelectQuery::descendants(Condition::new(
                "p.ancestor = ?",
                vec![Bind::Int(id.get())],
            )?),
            (Some(_), QueryTarget::Content(id)) => SelectQuery::descendants(Condition::new(
                "p.ancestor IN (SELECT id FROM location WHERE content_id = ? AND is_main = 1)",
                vec![Bind::Int(id.get())],
            )?),
            (None, QueryTarget::Kinds(kinds)) => {
                let query = SelectQuery::located().filter(Condition::raw("l.is_main = 1")?);
                return kinds_filter(query, kinds);
            }
            (None, QueryTarget::Content(id)) => SelectQuery::located()
                .filter(Condition::raw("l.is_main = 1")?)
                .filter(Condition::new("c.id = ?", vec![Bind::Int(id.get())])?),
            (None, QueryTarget::Location(id)) => SelectQuery::located()
                .filter(Condition::new("l.id = ?", vec![Bind::Int(id.get())])?),
        };

        match &self.children {
            Some(kinds) => kinds_filter(query, kinds),
            None => Ok(query),
        }
    }

    fn apply(&self, query: SelectQuery, op: &QueryOp) -> AppResult<SelectQuery> {
        match op {
            QueryOp::Depth(levels) => {
                if !query.has_path_join() {
                    return Err(AppError::validation("depth() requires children()"));
                }
                if *levels == 0 {
                    return Err(AppError::validation("depth() must be at least 1"));
                }
                Ok(query.filter(Condition::new(
                    "p.length BETWEEN 1 AND ?",
                    vec![Bind::Int(i64::from(*levels))],
                )?))
            }
            QueryOp::Status(status) => Ok(query.filter(Condition::new(
                "c.status = ?",
                vec![Bind::Int(i64::from(status.code()))],
            )?)),
            QueryOp::AnyStatus => Ok(query),
            QueryOp::LoadPath => Ok(query.with_paths()),
            QueryOp::LoadLocations => Ok(query.with_locations()),
            QueryOp::Extension { name, args } => {
                let f = self.extensions.get(name).ok_or_else(|| {
                    AppError::not_found(format!("Query extension '{name}' is not registered"))
                })?;
                f(query, args)
            }
        }
    }

    fn apply_tail(&self, mut query: SelectQuery) -> AppResult<SelectQuery> {
        if let Some(name) = &self.name {
            query = query.filter(Condition::new("c.name = ?", vec![Bind::from(name.as_str())])?);
        }
        if let Some(slug) = &self.slug {
            query = query.filter(Condition::new("c.slug = ?", vec![Bind::from(slug.as_str())])?);
        }
        for (column, direction) in &self.order {
            if *column == OrderColumn::Depth && !query.has_path_join() {
                return Err(AppError::validation("Ordering by depth requires children()"));
            }
            query = query.order_by(column.as_sql(), *direction);
        }
        if let Some(limit) = self.limit {
            if limit < 0 {
                return Err(AppError::validation("limit cannot be negative"));
            }
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(AppError::validation("offset cannot be negative"));
            }
            query = query.offset(offset);
        }
        Ok(query)
    }

    async fn fetch(&self, query: &SelectQuery) -> AppResult<Vec<LocatedContent>> {
        let mut qb = query.to_builder();
        debug!(sql = %qb.sql(), "Executing content query");

        let rows: Vec<LocatedRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to query content", e))?;
        let mut items: Vec<LocatedContent> = rows.into_iter().map(LocatedContent::from).collect();

        if query.loads_paths() {
            attach_paths(&self.pool, &mut items).await?;
        }
        if query.loads_locations() {
            attach_locations(&self.pool, &mut items).await?;
        }
        Ok(items)
    }
}

fn kinds_filter(query: SelectQuery, kinds: &[ContentKind]) -> AppResult<SelectQuery> {
    if kinds.is_empty() {
        return Ok(query);
    }
    let placeholders = vec!["?"; kinds.len()].join(", ");
    let binds = kinds.iter().map(|k| Bind::from(k.as_str())).collect();
    Ok(query.filter(Condition::new(format!("c.type IN ({placeholders})"), binds)?))
}

/// Ids bound per eager-load statement. SQLite caps a statement at 32766
/// parameters.
const BIND_CHUNK: usize = 1000;

async fn attach_paths(pool: &SqlitePool, items: &mut [LocatedContent]) -> AppResult<()> {
    let mut ids: Vec<LocationId> = items.iter().map(|item| item.location.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut by_location: HashMap<LocationId, Vec<Path>> = HashMap::new();
    for chunk in ids.chunks(BIND_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT ancestor, descendant, length FROM path WHERE descendant IN (",
        );
        let mut binds = qb.separated(", ");
        for id in chunk {
            binds.push_bind(*id);
        }
        qb.push(") ORDER BY descendant, length DESC");

        let paths: Vec<Path> = qb
            .build_query_as()
            .fetch_all(pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load paths", e))?;
        for path in paths {
            by_location.entry(path.descendant).or_default().push(path);
        }
    }

    for item in items.iter_mut() {
        item.paths = Some(by_location.get(&item.location.id).cloned().unwrap_or_default());
    }
    Ok(())
}

async fn attach_locations(pool: &SqlitePool, items: &mut [LocatedContent]) -> AppResult<()> {
    let mut ids: Vec<ContentId> = items.iter().map(|item| item.content.id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut by_content: HashMap<ContentId, Vec<Location>> = HashMap::new();
    for chunk in ids.chunks(BIND_CHUNK) {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, content_id, is_main FROM location WHERE content_id IN (",
        );
        let mut binds = qb.separated(", ");
        for id in chunk {
            binds.push_bind(*id);
        }
        qb.push(") ORDER BY content_id, id");

        let locations: Vec<Location> = qb.build_query_as().fetch_all(pool).await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load locations", e)
        })?;
        for location in locations {
            by_content.entry(location.content_id).or_default().push(location);
        }
    }

    for item in items.iter_mut() {
        item.locations = Some(by_content.get(&item.content.id).cloned().unwrap_or_default());
    }
    Ok(())
}
