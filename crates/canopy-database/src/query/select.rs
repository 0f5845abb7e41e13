//! Compiled form of a content query.
//!
//! A [`SelectQuery`] is plain data: a source shape, `AND`-ed conditions,
//! ordering, paging, and eager-load flags. It renders into an sqlx
//! [`QueryBuilder`] only when a terminal runs, and it is what query
//! extensions receive and return.
//!
//! Table aliases available to conditions: `c` (content), `l` (location) and,
//! for descendant queries only, `p` (path, with `p.descendant = l.id`).

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use canopy_core::error::AppError;
use canopy_core::result::AppResult;
use canopy_core::SortDirection;

/// Columns selected for a located content row.
pub(crate) const LOCATED_COLUMNS: &str = "l.id AS location_id, l.is_main, \
     c.id, c.type, c.name, c.slug, c.status, c.creator_id, c.attributes";

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bind {
    /// Integer parameter.
    Int(i64),
    /// Text parameter.
    Text(String),
}

impl From<i64> for Bind {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Bind {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Bind {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One SQL predicate with its parameters.
///
/// Placeholders are bare `?`, one per bind, in order. A `?` inside a
/// quoted literal or identifier (`'...'` or `"..."`) is text, not a
/// placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    sql: String,
    binds: Vec<Bind>,
}

impl Condition {
    /// Build a condition, checking the placeholder count against `binds`.
    pub fn new(sql: impl Into<String>, binds: Vec<Bind>) -> AppResult<Self> {
        let sql = sql.into();
        let placeholders = placeholder_offsets(&sql).len();
        if placeholders != binds.len() {
            return Err(AppError::validation(format!(
                "Condition '{sql}' has {placeholders} placeholders but {} binds",
                binds.len()
            )));
        }
        Ok(Self { sql, binds })
    }

    /// A condition without parameters.
    pub fn raw(sql: impl Into<String>) -> AppResult<Self> {
        Self::new(sql, Vec::new())
    }

    /// The SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The parameters, in placeholder order.
    pub fn binds(&self) -> &[Bind] {
        &self.binds
    }

    fn push_to(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut start = 0;
        for (offset, bind) in placeholder_offsets(&self.sql).into_iter().zip(&self.binds) {
            qb.push(&self.sql[start..offset]);
            match bind {
                Bind::Int(v) => qb.push_bind(*v),
                Bind::Text(v) => qb.push_bind(v.clone()),
            };
            start = offset + 1;
        }
        qb.push(&self.sql[start..]);
    }
}

/// Byte offsets of the `?` placeholders in `sql`, skipping quoted spans.
///
/// A doubled quote inside a literal closes and reopens it, which leaves
/// the scan in the right state.
fn placeholder_offsets(sql: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut quote: Option<char> = None;
    for (i, ch) in sql.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '?') => offsets.push(i),
            (None, _) => {}
        }
    }
    offsets
}

/// Row source of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    /// Locations joined with their content.
    Located,
    /// Like `Located`, joined through the closure table as descendants.
    Descendants,
}

/// The compiled, executable shape of a content query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    source: Source,
    conditions: Vec<Condition>,
    order: Vec<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
    load_paths: bool,
    load_locations: bool,
}

impl SelectQuery {
    /// Query over every location joined with its content.
    pub fn located() -> Self {
        Self::with_source(Source::Located)
    }

    /// Query over locations reached through `p`, with `anchor` selecting the
    /// ancestor side of the closure rows.
    pub fn descendants(anchor: Condition) -> Self {
        Self::with_source(Source::Descendants).filter(anchor)
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            load_paths: false,
            load_locations: false,
        }
    }

    /// The row source.
    pub fn source(&self) -> Source {
        self.source
    }

    /// Whether the closure table is joined as `p`.
    pub fn has_path_join(&self) -> bool {
        self.source == Source::Descendants
    }

    /// Add an `AND`-ed condition.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The conditions, in the order they were added.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Append an ordering term.
    pub fn order_by(mut self, expr: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((expr.into(), direction));
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip rows.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Request the closure rows of every result location.
    pub fn with_paths(mut self) -> Self {
        self.load_paths = true;
        self
    }

    /// Request every location of every result node.
    pub fn with_locations(mut self) -> Self {
        self.load_locations = true;
        self
    }

    /// Whether paths are eager-loaded.
    pub fn loads_paths(&self) -> bool {
        self.load_paths
    }

    /// Whether locations are eager-loaded.
    pub fn loads_locations(&self) -> bool {
        self.load_locations
    }

    /// Render the row-returning statement.
    pub fn to_builder(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(LOCATED_COLUMNS);
        self.push_body(&mut qb);
        self.push_tail(&mut qb);
        qb
    }

    /// Render a `COUNT(*)` over the rows the statement would return.
    pub fn to_count_builder(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM (SELECT l.id");
        self.push_body(&mut qb);
        self.push_tail(&mut qb);
        qb.push(")");
        qb
    }

    /// The rendered SQL, with `?` placeholders.
    pub fn sql(&self) -> String {
        self.to_builder().sql().to_string()
    }

    fn push_body(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" FROM location l JOIN content c ON c.id = l.content_id");
        if self.has_path_join() {
            qb.push(" JOIN path p ON p.descendant = l.id");
        }

        for (i, condition) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE (" } else { " AND (" });
            condition.push_to(qb);
            qb.push(")");
        }
    }

    fn push_tail(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" ORDER BY ");
        if self.order.is_empty() {
            qb.push("l.id ASC");
        } else {
            for (i, (expr, direction)) in self.order.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                qb.push(expr);
                qb.push(" ");
                qb.push(direction.as_sql());
            }
            qb.push(", l.id ASC");
        }

        // SQLite only accepts OFFSET after a LIMIT; -1 means no limit.
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                qb.push(" LIMIT ");
                qb.push_bind(limit);
                if let Some(offset) = offset {
                    qb.push(" OFFSET ");
                    qb.push_bind(offset);
                }
            }
            (None, Some(offset)) => {
                qb.push(" LIMIT -1 OFFSET ");
                qb.push_bind(offset);
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_rejects_placeholder_mismatch() {
        let err = Condition::new("c.id = ? AND c.slug = ?", vec![Bind::Int(1)]).unwrap_err();
        assert!(err.is(canopy_core::ErrorKind::Validation));
    }

    #[test]
    fn test_question_marks_in_literals_are_not_placeholders() {
        assert!(Condition::new("c.name LIKE '%?'", Vec::new()).is_ok());
        assert!(Condition::raw("json_extract(c.attributes, '$.\"why?\"') IS NULL").is_ok());
        assert_eq!(placeholder_offsets("c.slug = 'it''s?' AND c.id = ?"), vec![29]);

        let err = Condition::new("c.name = 'a?' AND c.slug = ?", Vec::new()).unwrap_err();
        assert!(err.is(canopy_core::ErrorKind::Validation));
    }

    #[test]
    fn test_condition_binds_skip_quoted_text() {
        let condition =
            Condition::new("c.name <> 'why?' AND c.slug = ?", vec![Bind::from("a3")]).unwrap();
        let mut qb = QueryBuilder::<Sqlite>::new("");
        condition.push_to(&mut qb);
        assert_eq!(qb.sql(), "c.name <> 'why?' AND c.slug = ?");
    }

    #[test]
    fn test_located_query_defaults_to_location_order() {
        let sql = SelectQuery::located().sql();
        assert_eq!(
            sql,
            format!(
                "SELECT {LOCATED_COLUMNS} FROM location l JOIN content c ON c.id = l.content_id \
                 ORDER BY l.id ASC"
            )
        );
    }

    #[test]
    fn test_descendants_query_joins_path_and_wraps_conditions() {
        let anchor = Condition::new("p.ancestor = ?", vec![Bind::Int(3)]).unwrap();
        let query = SelectQuery::descendants(anchor)
            .filter(Condition::new("p.length BETWEEN 1 AND ?", vec![Bind::Int(2)]).unwrap())
            .order_by("c.name", SortDirection::Desc)
            .limit(5)
            .offset(10);

        let sql = query.sql();
        assert!(sql.contains("JOIN path p ON p.descendant = l.id"));
        assert!(sql.contains("WHERE (p.ancestor = ?) AND (p.length BETWEEN 1 AND ?)"));
        assert!(sql.ends_with("ORDER BY c.name DESC, l.id ASC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = SelectQuery::located().offset(4).sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET ?"));
    }

    #[test]
    fn test_count_wraps_statement() {
        let sql = SelectQuery::located().to_count_builder().sql().to_string();
        assert!(sql.starts_with("SELECT COUNT(*) FROM (SELECT l.id FROM location l"));
        assert!(sql.ends_with(")"));
    }
}
