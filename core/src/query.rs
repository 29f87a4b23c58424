//! The query scope a datatable is built against.
//!
//! A [`Query`] is a plain value: filters, joins, ordering and paging are
//! recorded on it and rendered to SQL by [`Query::to_select_sql`] and
//! [`Query::to_count_sql`]. Drivers execute the rendered statements.

use compact_str::{CompactString, format_compact};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DataTablesError, Result};
use crate::expressions::{Boolean, Condition, WhereGroup};
use crate::join::Join;
use crate::schema::{Pivot, RelationKind, Schema};
use crate::sql::{ColumnRef, SQL};
use crate::Dialect;

/// Sort direction for ORDER BY clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    Asc,
    Desc,
}

impl OrderBy {
    /// Parses the protocol's `asc`/`desc`. Any other spelling is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(OrderBy::Asc),
            "desc" => Some(OrderBy::Desc),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Asc => "ASC",
            OrderBy::Desc => "DESC",
        }
    }
}

/// Pivot table the root rows were reached through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotScope {
    pub table: CompactString,
    pub accessor: CompactString,
    pub columns: Vec<CompactString>,
}

#[derive(Clone, Debug, PartialEq)]
enum Selection {
    All,
    Columns(Vec<SQL>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    entity: CompactString,
    table: CompactString,
    selection: Selection,
    joins: Vec<Join>,
    wheres: WhereGroup,
    orders: Vec<(SQL, OrderBy)>,
    offset: Option<u64>,
    limit: Option<u64>,
    pivot: Option<PivotScope>,
    eager: Vec<String>,
}

impl Query {
    /// A query over every row of the entity's table.
    pub fn table(schema: &Schema, entity: &str) -> Result<Self> {
        let entity = schema.get(entity)?;
        let mut query = Self {
            entity: entity.name.clone(),
            table: entity.table.clone(),
            selection: Selection::All,
            joins: Vec::new(),
            wheres: WhereGroup::new(),
            orders: Vec::new(),
            offset: None,
            limit: None,
            pivot: None,
            eager: Vec::new(),
        };
        if let Some(deleted_at) = &entity.deleted_at {
            query
                .wheres
                .where_null(ColumnRef::new(entity.table.clone(), deleted_at.clone()));
        }
        Ok(query)
    }

    /// A query over the rows related to one parent row.
    ///
    /// For many-to-many relations the pivot table is joined and its columns
    /// become addressable through the pivot accessor.
    pub fn for_relation(
        schema: &Schema,
        parent: &str,
        relation: &str,
        parent_key: impl Into<Value>,
    ) -> Result<Self> {
        let parent_entity = schema.get(parent)?;
        let (relation, related) = schema.related(parent_entity, relation)?;
        let mut query = Self::table(schema, &related.name)?;
        let table = related.table.clone();
        let parent_key = parent_key.into();

        match &relation.kind {
            RelationKind::HasOne { foreign_key, .. } | RelationKind::HasMany { foreign_key, .. } => {
                query
                    .wheres
                    .where_eq(ColumnRef::new(table, foreign_key.clone()), parent_key);
            }
            RelationKind::BelongsTo { owner_key, .. } => {
                query
                    .wheres
                    .where_eq(ColumnRef::new(table, owner_key.clone()), parent_key);
            }
            RelationKind::BelongsToMany(pivot) => {
                query.through(pivot);
                query.wheres.where_eq(
                    ColumnRef::new(pivot.table.clone(), pivot.foreign_pivot_key.clone()),
                    parent_key,
                );
            }
            kind @ RelationKind::MorphTo { .. } => {
                return Err(DataTablesError::UnsupportedRelation {
                    entity: parent_entity.name.to_string(),
                    relation: relation.name.to_string(),
                    kind: kind.name(),
                });
            }
        }

        Ok(query)
    }

    /// Reaches the root rows through a pivot table, exposing the pivot's
    /// keys and extra columns under its accessor.
    pub fn through(&mut self, pivot: &Pivot) -> &mut Self {
        self.join(Join::inner(
            pivot.table.clone(),
            ColumnRef::new(pivot.table.clone(), pivot.related_pivot_key.clone()),
            ColumnRef::new(self.table.clone(), pivot.related_key.clone()),
        ));
        let mut columns = vec![pivot.foreign_pivot_key.clone(), pivot.related_pivot_key.clone()];
        columns.extend(pivot.columns.iter().cloned());
        self.pivot = Some(PivotScope {
            table: pivot.table.clone(),
            accessor: pivot.accessor.clone(),
            columns,
        });
        self
    }

    /// Declares relations to load onto fetched records, e.g. `["user", "categories"]`.
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.eager.extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn pivot(&self) -> Option<&PivotScope> {
        self.pivot.as_ref()
    }

    pub fn eager(&self) -> &[String] {
        &self.eager
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn wheres(&self) -> &WhereGroup {
        &self.wheres
    }

    pub fn orders(&self) -> &[(SQL, OrderBy)] {
        &self.orders
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    /// Qualifies a column by the root table.
    pub fn qualify(&self, column: impl Into<CompactString>) -> ColumnRef {
        ColumnRef::new(self.table.clone(), column)
    }

    /// Whether a join addressed by `name` has already been applied.
    pub fn has_join(&self, name: &str) -> bool {
        self.joins.iter().any(|join| join.name() == name)
    }

    /// Applies a join unless one with the same name exists.
    ///
    /// Returns `true` when the join was newly added.
    pub fn join(&mut self, join: Join) -> bool {
        if self.has_join(join.name()) {
            return false;
        }
        self.joins.push(join);
        true
    }

    /// Appends a predicate combined with `AND`.
    pub fn filter(&mut self, condition: Condition) -> &mut Self {
        self.wheres.push(Boolean::And, condition);
        self
    }

    /// Appends a predicate group combined with `AND`.
    pub fn filter_group(&mut self, group: WhereGroup) -> &mut Self {
        self.filter(Condition::Group(group))
    }

    pub fn where_mut(&mut self) -> &mut WhereGroup {
        &mut self.wheres
    }

    pub fn order_by(&mut self, expr: SQL, direction: OrderBy) -> &mut Self {
        self.orders.push((expr, direction));
        self
    }

    pub fn order_by_column(&mut self, column: ColumnRef, direction: OrderBy) -> &mut Self {
        self.order_by(SQL::column(column), direction)
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts the selection to the root table's columns (plus pivot
    /// columns under their accessor), so joined tables cannot shadow them.
    pub fn select_root(&mut self) -> &mut Self {
        let mut columns = vec![SQL::ident(self.table.clone()).push_raw(".*")];
        if let Some(pivot) = &self.pivot {
            for column in &pivot.columns {
                columns.push(
                    SQL::column(ColumnRef::new(pivot.table.clone(), column.clone()))
                        .push_raw("AS")
                        .append(SQL::ident(format_compact!("{}.{}", pivot.accessor, column))),
                );
            }
        }
        self.selection = Selection::Columns(columns);
        self
    }

    /// Replaces the selection with explicit expressions.
    pub fn select(&mut self, columns: Vec<SQL>) -> &mut Self {
        self.selection = Selection::Columns(columns);
        self
    }

    /// Whether no explicit selection has been made.
    pub fn selects_all(&self) -> bool {
        matches!(self.selection, Selection::All)
    }

    fn from_sql(&self) -> SQL {
        let mut sql = SQL::raw("FROM").append(SQL::ident(self.table.clone()));
        for join in &self.joins {
            sql = sql.append(join.to_sql());
        }
        if !self.wheres.is_empty() {
            sql = sql.push_raw("WHERE").append(self.wheres.to_sql());
        }
        sql
    }

    /// `SELECT COUNT(*)` over the filtered scope, ignoring order and paging.
    pub fn to_count_sql(&self) -> SQL {
        SQL::raw("SELECT COUNT(*) AS")
            .append(SQL::ident("aggregate"))
            .append(self.from_sql())
    }

    pub fn to_select_sql(&self, dialect: Dialect) -> SQL {
        let selection = match &self.selection {
            Selection::All => SQL::raw("*"),
            Selection::Columns(columns) => SQL::join(columns.iter().cloned(), ","),
        };
        let mut sql = SQL::raw("SELECT").append(selection).append(self.from_sql());

        if !self.orders.is_empty() {
            let orders = self
                .orders
                .iter()
                .map(|(expr, direction)| expr.clone().push_raw(direction.as_str()));
            sql = sql.push_raw("ORDER BY").append(SQL::join(orders, ","));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql = sql.push_raw(format_compact!("LIMIT {limit}"));
                if let Some(offset) = offset {
                    sql = sql.push_raw(format_compact!("OFFSET {offset}"));
                }
            }
            (None, Some(offset)) => {
                // SQLite and MySQL only accept OFFSET after a LIMIT.
                sql = match dialect {
                    Dialect::SQLite => sql.push_raw("LIMIT -1"),
                    Dialect::MySQL => sql.push_raw("LIMIT 18446744073709551615"),
                    Dialect::PostgreSQL => sql,
                };
                sql = sql.push_raw(format_compact!("OFFSET {offset}"));
            }
            (None, None) => {}
        }

        sql
    }
}
