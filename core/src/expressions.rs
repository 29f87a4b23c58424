//! WHERE predicates and boolean grouping.

use serde_json::Value;

use crate::sql::{ColumnRef, SQL, SQLChunk, Token};

/// How a predicate combines with the ones before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "AND",
            Boolean::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Like { column: ColumnRef, pattern: String },
    Regexp { column: ColumnRef, pattern: String },
    Eq { column: ColumnRef, value: Value },
    In { column: ColumnRef, values: Vec<Value> },
    IsNull(ColumnRef),
    Group(WhereGroup),
    Raw(SQL),
}

impl Condition {
    pub fn to_sql(&self) -> SQL {
        match self {
            Condition::Like { column, pattern } => SQL::column(column.clone())
                .push(SQLChunk::Token(Token::Like))
                .append(SQL::param(pattern.as_str())),
            Condition::Regexp { column, pattern } => SQL::column(column.clone())
                .push(SQLChunk::Token(Token::Regexp))
                .append(SQL::param(pattern.as_str())),
            Condition::Eq { column, value } => SQL::column(column.clone())
                .push_raw("=")
                .append(SQL::param(value.clone())),
            // `IN ()` is not valid SQL; an empty set matches nothing.
            Condition::In { values, .. } if values.is_empty() => SQL::raw("1 = 0"),
            Condition::In { column, values } => SQL::column(column.clone())
                .push_raw("IN (")
                .append(SQL::join(values.iter().cloned().map(SQL::param), ","))
                .push_raw(")"),
            Condition::IsNull(column) => SQL::column(column.clone()).push_raw("IS NULL"),
            Condition::Group(group) => SQL::raw("(").append(group.to_sql()).push_raw(")"),
            Condition::Raw(sql) => sql.clone(),
        }
    }
}

/// An ordered list of predicates, each tagged with its connective.
///
/// The connective of the first predicate is ignored when rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WhereGroup {
    clauses: Vec<(Boolean, Condition)>,
}

impl WhereGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, boolean: Boolean, condition: Condition) -> &mut Self {
        // Empty nested groups would render as `()`.
        if let Condition::Group(group) = &condition {
            if group.is_empty() {
                return self;
            }
        }
        self.clauses.push((boolean, condition));
        self
    }

    pub fn where_like(&mut self, column: ColumnRef, pattern: impl Into<String>) -> &mut Self {
        self.push(
            Boolean::And,
            Condition::Like {
                column,
                pattern: pattern.into(),
            },
        )
    }

    pub fn or_where_like(&mut self, column: ColumnRef, pattern: impl Into<String>) -> &mut Self {
        self.push(
            Boolean::Or,
            Condition::Like {
                column,
                pattern: pattern.into(),
            },
        )
    }

    pub fn where_regexp(&mut self, column: ColumnRef, pattern: impl Into<String>) -> &mut Self {
        self.push(
            Boolean::And,
            Condition::Regexp {
                column,
                pattern: pattern.into(),
            },
        )
    }

    pub fn where_eq(&mut self, column: ColumnRef, value: impl Into<Value>) -> &mut Self {
        self.push(
            Boolean::And,
            Condition::Eq {
                column,
                value: value.into(),
            },
        )
    }

    pub fn where_in(&mut self, column: ColumnRef, values: Vec<Value>) -> &mut Self {
        self.push(Boolean::And, Condition::In { column, values })
    }

    pub fn where_null(&mut self, column: ColumnRef) -> &mut Self {
        self.push(Boolean::And, Condition::IsNull(column))
    }

    pub fn where_raw(&mut self, sql: SQL) -> &mut Self {
        self.push(Boolean::And, Condition::Raw(sql))
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(Boolean, Condition)] {
        &self.clauses
    }

    pub fn to_sql(&self) -> SQL {
        let mut sql = SQL::empty();
        for (i, (boolean, condition)) in self.clauses.iter().enumerate() {
            if i > 0 {
                sql = sql.push_raw(boolean.as_str());
            }
            sql = sql.append(condition.to_sql());
        }
        sql
    }
}
