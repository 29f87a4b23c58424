use compact_str::CompactString;
use serde_json::Value;
use smallvec::SmallVec;

use crate::Dialect;

/// SQL keywords whose spelling depends on the dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Like,
    Regexp,
}

impl Token {
    /// PostgreSQL pattern operators only apply to text, so the preceding
    /// column is cast first.
    pub const fn render(&self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (Token::Like, Dialect::PostgreSQL) => "::text ILIKE",
            (Token::Like, _) => "LIKE",
            (Token::Regexp, Dialect::PostgreSQL) => "::text ~",
            (Token::Regexp, _) => "REGEXP",
        }
    }
}

/// A column reference qualified by its table (or join alias).
///
/// A non-empty `json_path` addresses a field inside a JSON column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<CompactString>,
    pub column: CompactString,
    pub json_path: SmallVec<[CompactString; 2]>,
}

impl ColumnRef {
    pub fn new(table: impl Into<CompactString>, column: impl Into<CompactString>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
            json_path: SmallVec::new(),
        }
    }

    /// Parses `column.key.key` into a column with a JSON path below it.
    pub fn with_json(table: impl Into<CompactString>, name: &str) -> Self {
        let mut parts = name.split('.');
        let column = parts.next().unwrap_or_default();
        Self {
            table: Some(table.into()),
            column: column.into(),
            json_path: parts.map(CompactString::from).collect(),
        }
    }

    pub fn is_json(&self) -> bool {
        !self.json_path.is_empty()
    }

    pub fn render(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        if let Some(table) = &self.table {
            out.push_str(&dialect.quote_ident(table));
            out.push('.');
        }
        out.push_str(&dialect.quote_ident(&self.column));
        if self.is_json() {
            dialect.json_access(&out, self.json_path.as_slice())
        } else {
            out
        }
    }
}

/// A SQL chunk represents a part of an SQL statement.
#[derive(Clone, Debug, PartialEq)]
pub enum SQLChunk {
    Text(CompactString),
    Token(Token),
    Ident(CompactString),
    Column(ColumnRef),
    Param(Value),
}

impl SQLChunk {
    fn render(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        match self {
            SQLChunk::Text(text) => text.to_string(),
            SQLChunk::Token(token) => token.render(dialect).to_string(),
            SQLChunk::Ident(ident) => dialect.quote_ident(ident),
            SQLChunk::Column(column) => column.render(dialect),
            SQLChunk::Param(value) => {
                params.push(value.clone());
                dialect.render_placeholder(params.len())
            }
        }
    }
}

/// A SQL statement or fragment with parameters.
///
/// Fragments stay dialect-neutral until [`SQL::build`] renders them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SQL {
    pub chunks: SmallVec<[SQLChunk; 4]>,
}

impl SQL {
    /// Creates a new empty SQL fragment.
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    pub fn raw(text: impl Into<CompactString>) -> Self {
        Self::empty().push(SQLChunk::Text(text.into()))
    }

    pub fn ident(name: impl Into<CompactString>) -> Self {
        Self::empty().push(SQLChunk::Ident(name.into()))
    }

    pub fn column(column: ColumnRef) -> Self {
        Self::empty().push(SQLChunk::Column(column))
    }

    pub fn param(value: impl Into<Value>) -> Self {
        Self::empty().push(SQLChunk::Param(value.into()))
    }

    pub fn push(mut self, chunk: SQLChunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn push_raw(self, text: impl Into<CompactString>) -> Self {
        self.push(SQLChunk::Text(text.into()))
    }

    pub fn append(mut self, other: SQL) -> Self {
        self.chunks.extend(other.chunks);
        self
    }

    /// Joins fragments with a separator, e.g. `", "` or `" AND "`.
    pub fn join(parts: impl IntoIterator<Item = SQL>, separator: &'static str) -> Self {
        let mut out = SQL::empty();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out = out.push_raw(separator);
            }
            out = out.append(part);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Renders the SQL text and collects bound parameters in order.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut buf = String::new();
        let mut params = Vec::new();
        for chunk in &self.chunks {
            let text = chunk.render(dialect, &mut params);
            write_spaced(&mut buf, &text);
        }
        (buf, params)
    }

    /// Returns the SQL text only.
    pub fn sql(&self, dialect: Dialect) -> String {
        self.build(dialect).0
    }
}

fn write_spaced(buf: &mut String, text: &str) {
    let Some(first) = text.chars().next() else {
        return;
    };
    if let Some(last) = buf.chars().last() {
        let glued = matches!(last, '(' | ' ' | '.') || matches!(first, ')' | ',' | ' ' | '.' | ':');
        if !glued {
            buf.push(' ');
        }
    }
    buf.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spacing_and_placeholders() {
        let sql = SQL::column(ColumnRef::new("posts", "title"))
            .push(SQLChunk::Token(Token::Like))
            .append(SQL::param("%First%"))
            .push_raw("AND")
            .append(SQL::column(ColumnRef::new("posts", "id")))
            .push_raw("IN (")
            .append(SQL::join([SQL::param(1), SQL::param(2)], ","))
            .push_raw(")");

        let (text, params) = sql.build(Dialect::SQLite);
        assert_eq!(
            text,
            r#""posts"."title" LIKE ? AND "posts"."id" IN (?, ?)"#
        );
        assert_eq!(params, vec![json!("%First%"), json!(1), json!(2)]);

        let (text, _) = sql.build(Dialect::PostgreSQL);
        assert_eq!(
            text,
            r#""posts"."title"::text ILIKE $1 AND "posts"."id" IN ($2, $3)"#
        );
    }

    #[test]
    fn json_column_reference() {
        let column = ColumnRef::with_json("posts", "meta.author");
        assert!(column.is_json());
        assert_eq!(
            column.render(Dialect::SQLite),
            r#"json_extract("posts"."meta", '$."author"')"#
        );
    }
}
