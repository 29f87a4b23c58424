//! rusqlite-backed driver

use datatables_core::{
    Dialect, Driver, Query, Record, Result, datatables_trace_query, nest_dotted,
};
use rusqlite::{Connection, params_from_iter};

use crate::functions::register_regexp;
use crate::values::{to_json, to_sql};

/// Runs datatable queries on a rusqlite [`Connection`].
#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    /// Wraps a connection and registers the `REGEXP` function on it.
    pub fn new(conn: Connection) -> Result<Self> {
        register_regexp(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl Driver for SqliteDriver {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn count(&self, query: &Query) -> Result<u64> {
        let (sql, params) = query.to_count_sql().build(Dialect::SQLite);
        datatables_trace_query!(&sql, params.len());

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(params.iter().map(to_sql)), |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn get(&self, query: &Query) -> Result<Vec<Record>> {
        let (sql, params) = query.to_select_sql(Dialect::SQLite).build(Dialect::SQLite);
        datatables_trace_query!(&sql, params.len());

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params_from_iter(params.iter().map(to_sql)), |row| {
            let mut record = Record::new();
            for (index, name) in names.iter().enumerate() {
                record.insert(name.clone(), to_json(row.get_ref(index)?));
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(nest_dotted(record?));
        }
        Ok(records)
    }
}
