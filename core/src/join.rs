//! Join clauses applied to a query scope.
//!
//! Relation traversal emits joins through [`Query::join`](crate::Query::join),
//! which keys each clause by the name it is addressed by so that a relation
//! is never joined twice.

use compact_str::CompactString;

use crate::sql::{ColumnRef, SQL};

/// The type of JOIN operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Left,
    Inner,
}

impl JoinType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Left => "LEFT JOIN",
            JoinType::Inner => "INNER JOIN",
        }
    }
}

/// A single `JOIN table [AS alias] ON ...` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: CompactString,
    pub alias: Option<CompactString>,
    pub first: ColumnRef,
    pub second: ColumnRef,
    /// Soft-delete column of the joined table; rendered as `IS NULL` in the ON clause.
    pub deleted_at: Option<ColumnRef>,
}

impl Join {
    pub fn left(table: impl Into<CompactString>, first: ColumnRef, second: ColumnRef) -> Self {
        Self {
            join_type: JoinType::Left,
            table: table.into(),
            alias: None,
            first,
            second,
            deleted_at: None,
        }
    }

    pub fn inner(table: impl Into<CompactString>, first: ColumnRef, second: ColumnRef) -> Self {
        Self {
            join_type: JoinType::Inner,
            ..Self::left(table, first, second)
        }
    }

    pub fn alias(mut self, alias: impl Into<CompactString>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn without_trashed(mut self, column: ColumnRef) -> Self {
        self.deleted_at = Some(column);
        self
    }

    /// The name other clauses use to address the joined table.
    pub fn name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    pub fn to_sql(&self) -> SQL {
        let mut sql = SQL::raw(self.join_type.as_str()).append(SQL::ident(self.table.clone()));
        if let Some(alias) = &self.alias {
            sql = sql.push_raw("AS").append(SQL::ident(alias.clone()));
        }
        sql = sql
            .push_raw("ON")
            .append(SQL::column(self.first.clone()))
            .push_raw("=")
            .append(SQL::column(self.second.clone()));
        if let Some(deleted_at) = &self.deleted_at {
            sql = sql
                .push_raw("AND")
                .append(SQL::column(deleted_at.clone()))
                .push_raw("IS NULL");
        }
        sql
    }
}
