//! SQL functions SQLite does not ship with.

use std::sync::Arc;

use regex::Regex;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use crate::values::to_text;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers `regexp(pattern, text)`, which backs the `text REGEXP pattern`
/// operator. The compiled pattern is cached per statement.
pub fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let regex: Arc<Regex> = ctx.get_or_create_aux(0, |pattern| -> Result<_, BoxError> {
                Ok(Regex::new(pattern.as_str()?)?)
            })?;
            Ok(to_text(ctx.get_raw(1)).is_some_and(|text| regex.is_match(&text)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regexp_operator() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();

        let matches = |text: &str, pattern: &str| -> bool {
            conn.query_row("SELECT ?1 REGEXP ?2", [text, pattern], |row| row.get(0))
                .unwrap()
        };
        assert!(matches("First", "^F"));
        assert!(!matches("Alpha", "^F"));

        let null: bool = conn
            .query_row("SELECT NULL REGEXP '.*'", [], |row| row.get(0))
            .unwrap();
        assert!(!null);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        let result: rusqlite::Result<bool> =
            conn.query_row("SELECT 'a' REGEXP '('", [], |row| row.get(0));
        assert!(result.is_err());
    }
}
