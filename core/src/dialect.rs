//! SQL dialect for database-specific rendering.

use core::fmt;

use serde::{Deserialize, Serialize};

/// SQL dialect for database-specific behavior
///
/// Each dialect has different placeholder syntax, identifier quoting, pattern
/// matching operators and JSON access functions.
///
/// ```
/// use datatables_core::Dialect;
///
/// assert_eq!(Dialect::PostgreSQL.render_placeholder(2), "$2");
/// assert_eq!(Dialect::SQLite.quote_ident("posts"), "\"posts\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// SQLite - uses `?` positional placeholders
    #[default]
    SQLite,

    /// PostgreSQL - uses `$1, $2, ...` numbered placeholders
    #[serde(alias = "postgres")]
    PostgreSQL,

    /// MySQL - uses `?` positional placeholders
    MySQL,
}

impl Dialect {
    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Renders the placeholder for a 1-based parameter index.
    #[must_use]
    pub fn render_placeholder(&self, index: usize) -> String {
        if self.uses_numbered_placeholders() {
            format!("${index}")
        } else {
            "?".to_string()
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    #[must_use]
    pub fn quote_ident(&self, ident: &str) -> String {
        let quote = match self {
            Dialect::MySQL => '`',
            Dialect::SQLite | Dialect::PostgreSQL => '"',
        };
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(quote);
        for ch in ident.chars() {
            if ch == quote {
                out.push(quote);
            }
            out.push(ch);
        }
        out.push(quote);
        out
    }

    /// Renders a JSON field lookup on an already-quoted column expression.
    ///
    /// `path` holds the keys below the column, outermost first.
    #[must_use]
    pub fn json_access(&self, column: &str, path: &[impl AsRef<str>]) -> String {
        match self {
            Dialect::SQLite => format!("json_extract({column}, '{}')", json_path(path)),
            Dialect::MySQL => {
                format!("json_unquote(json_extract({column}, '{}'))", json_path(path))
            }
            Dialect::PostgreSQL => match path {
                [single] => format!("{column}->>'{}'", escape_literal(single.as_ref())),
                _ => {
                    let keys: Vec<String> = path
                        .iter()
                        .map(|key| escape_literal(key.as_ref()))
                        .collect();
                    format!("{column}#>>'{{{}}}'", keys.join(","))
                }
            },
        }
    }

    /// Get the dialect name as a lowercase string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Dialect::SQLite => "sqlite",
            Dialect::PostgreSQL => "postgresql",
            Dialect::MySQL => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_path(path: &[impl AsRef<str>]) -> String {
    let mut out = String::from("$");
    for key in path {
        out.push_str(".\"");
        out.push_str(&escape_literal(key.as_ref()).replace('"', "\\\""));
        out.push('"');
    }
    out
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(Dialect::SQLite.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MySQL.quote_ident("posts"), "`posts`");
    }

    #[test]
    fn json_access_per_dialect() {
        let column = "\"posts\".\"meta\"";
        assert_eq!(
            Dialect::SQLite.json_access(column, &["author", "name"]),
            "json_extract(\"posts\".\"meta\", '$.\"author\".\"name\"')"
        );
        assert_eq!(
            Dialect::PostgreSQL.json_access(column, &["author"]),
            "\"posts\".\"meta\"->>'author'"
        );
        assert_eq!(
            Dialect::PostgreSQL.json_access(column, &["author", "name"]),
            "\"posts\".\"meta\"#>>'{author,name}'"
        );
    }
}
